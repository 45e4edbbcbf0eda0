mod eval;
mod verify;

pub use self::eval::{CheckMultiSigError, CheckSigError, SignatureEncodingError, eval_script};
pub use self::verify::Engine;
