//! Element types a host runtime may offer for a tensor binding.

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum DatumType {
    Bool,
    U8,
    I8,
    I32,
    F16,
    F32,
}
