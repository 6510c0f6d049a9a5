pub mod opcode;
pub mod rc4;
pub mod srp;
