pub mod encoding;
pub mod evaluator;
pub mod model;
pub mod network;


pub use encoding::{encode, encode_batch, InputTensors};
pub use evaluator::{EvalError, EvaluatorConfig, KataGoEvaluator};
pub use model::{load_model_bytes, parse_model, ModelDesc, ModelParser, ParseError, ParserConfig};
pub use network::{KataGoNetwork, NetworkOutput};
