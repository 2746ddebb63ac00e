mod desc;
mod error;
mod layers;
mod parser;
mod reader;

use std::io::Read;

use flate2::read::GzDecoder;

pub use desc::{
    GlobalPoolingBlock, ModelDesc, OrdinaryBlock, PolicyHeadDesc, PostProcessParams, TrunkBlock,
    TrunkDesc, ValueHeadDesc,
};
pub use error::{ParseError, ParseResult};
pub use layers::{Activation, BiasLayer, ConvLayer, MatMulLayer, NormLayer};
pub use parser::{ModelParser, ParserConfig};
pub use reader::ModelReader;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Parses an uncompressed weight file with the default version allow-list.
pub fn parse_model(data: &[u8]) -> ParseResult<ModelDesc> {
    ModelParser::new().parse(data)
}

/// Parses a weight file that may be gzip-compressed (`.bin.gz`).
pub fn load_model_bytes(data: &[u8]) -> ParseResult<ModelDesc> {
    if data.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::with_capacity(data.len() * 4);
        GzDecoder::new(data).read_to_end(&mut inflated)?;
        log::debug!(
            "Inflated {} compressed bytes to {}",
            data.len(),
            inflated.len()
        );
        return parse_model(&inflated);
    }
    parse_model(data)
}
