pub mod stage0_segment;
pub mod stage1_annotations;
pub mod stage2_reconcile;
pub mod stage3_assemble;

pub use stage0_segment::*;
pub use stage1_annotations::*;
pub use stage2_reconcile::*;
pub use stage3_assemble::*;
