pub mod features;
pub mod ids;
pub mod msa;
pub mod residue;
pub mod sequence;
