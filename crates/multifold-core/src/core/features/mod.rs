pub mod msa;
pub mod pairing;
pub mod sequence;
pub mod template;
