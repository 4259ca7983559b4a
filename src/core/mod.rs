// Domain-layer modules and shared errors
pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod upsert {
    pub use crate::upsert::*;
}

pub mod errors {
    pub use crate::errors::*;
}
