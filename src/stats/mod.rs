pub mod beta;
pub mod sampling;
pub mod special;

pub use beta::{BetaPosterior, CredibleInterval, GammaPosterior};
pub use sampling::Sampler;
pub use special::{incomplete_beta, inverse_incomplete_beta, ln_gamma};
