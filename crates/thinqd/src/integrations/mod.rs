pub mod thinq;

pub use thinq::ThinqConfig;
