use super::desc::{
    GlobalPoolingBlock, ModelDesc, OrdinaryBlock, PolicyHeadDesc, PostProcessParams, TrunkBlock,
    TrunkDesc, ValueHeadDesc,
};
use super::error::{ParseError, ParseResult};
use super::layers::{check_channels, Activation, BiasLayer, ConvLayer, MatMulLayer, NormLayer};
use super::reader::ModelReader;

/// First format version that stores its own post-process multipliers.
const POST_PROCESS_VERSION: i32 = 13;

/// Every network has exactly three value outputs: win, loss, no result.
const VALUE_OUTPUTS: usize = 3;

#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub supported_versions: Vec<i32>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            supported_versions: (8..=14).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelParser {
    config: ParserConfig,
}

impl ModelParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn parse(&self, data: &[u8]) -> ParseResult<ModelDesc> {
        let mut reader = ModelReader::new(data);

        let name = reader.read_token("model name")?.to_string();
        let version = reader.read_int("model version")?;
        if !self.config.supported_versions.contains(&version) {
            return Err(ParseError::UnsupportedVersion {
                version,
                supported: self.config.supported_versions.clone(),
            });
        }
        let num_input_channels = reader.read_usize("input channels")?;
        let num_input_global_channels = reader.read_usize("global input channels")?;

        let post_process = if version >= POST_PROCESS_VERSION {
            read_post_process(&mut reader)?
        } else {
            PostProcessParams::default()
        };

        log::debug!(
            "Parsing model '{}' (version {}, {} spatial / {} global inputs)",
            name,
            version,
            num_input_channels,
            num_input_global_channels
        );

        let trunk = read_trunk(
            &mut reader,
            version,
            num_input_channels,
            num_input_global_channels,
        )?;
        let policy_head = read_policy_head(&mut reader, version, trunk.trunk_channels)?;
        let value_head = read_value_head(&mut reader, version, trunk.trunk_channels)?;

        let trailing = reader.remaining();
        if trailing > 0 {
            log::debug!("Ignoring {} trailing bytes after value head", trailing);
        }

        let model = ModelDesc {
            name,
            version,
            num_input_channels,
            num_input_global_channels,
            post_process,
            trunk,
            policy_head,
            value_head,
        };

        log::info!(
            "Loaded model '{}': version {}, {} blocks, {} trunk channels, {} parameters",
            model.name,
            model.version,
            model.num_blocks(),
            model.trunk.trunk_channels,
            model.parameter_count()
        );

        Ok(model)
    }
}

fn read_post_process(reader: &mut ModelReader) -> ParseResult<PostProcessParams> {
    Ok(PostProcessParams {
        td_score_multiplier: reader.read_float("td score multiplier")?,
        score_mean_multiplier: reader.read_float("score mean multiplier")?,
        score_stdev_multiplier: reader.read_float("score stdev multiplier")?,
        lead_multiplier: reader.read_float("lead multiplier")?,
        variance_time_multiplier: reader.read_float("variance time multiplier")?,
        short_term_value_error_multiplier: reader.read_float("value error multiplier")?,
        short_term_score_error_multiplier: reader.read_float("score error multiplier")?,
    })
}

fn read_conv(reader: &mut ModelReader, in_channels: usize) -> ParseResult<ConvLayer> {
    let conv = ConvLayer::read(reader)?;
    check_channels(&conv.name, in_channels, conv.in_channels)?;
    Ok(conv)
}

fn read_conv_exact(
    reader: &mut ModelReader,
    in_channels: usize,
    out_channels: usize,
) -> ParseResult<ConvLayer> {
    let conv = read_conv(reader, in_channels)?;
    check_channels(&conv.name, out_channels, conv.out_channels)?;
    Ok(conv)
}

fn read_norm(reader: &mut ModelReader, channels: usize) -> ParseResult<NormLayer> {
    let norm = NormLayer::read(reader)?;
    check_channels(&norm.name, channels, norm.channels)?;
    Ok(norm)
}

fn read_matmul(reader: &mut ModelReader, in_channels: usize) -> ParseResult<MatMulLayer> {
    let matmul = MatMulLayer::read(reader)?;
    check_channels(&matmul.name, in_channels, matmul.in_channels)?;
    Ok(matmul)
}

fn read_matmul_exact(
    reader: &mut ModelReader,
    in_channels: usize,
    out_channels: usize,
) -> ParseResult<MatMulLayer> {
    let matmul = read_matmul(reader, in_channels)?;
    check_channels(&matmul.name, out_channels, matmul.out_channels)?;
    Ok(matmul)
}

fn read_bias(reader: &mut ModelReader, channels: usize) -> ParseResult<BiasLayer> {
    let bias = BiasLayer::read(reader)?;
    check_channels(&bias.name, channels, bias.channels)?;
    Ok(bias)
}

fn read_trunk(
    reader: &mut ModelReader,
    version: i32,
    num_input_channels: usize,
    num_input_global_channels: usize,
) -> ParseResult<TrunkDesc> {
    reader.expect_token("trunk")?;
    let num_blocks = reader.read_usize("trunk block count")?;
    let trunk_channels = reader.read_usize("trunk channels")?;
    let mid_channels = reader.read_usize("trunk mid channels")?;
    let regular_channels = reader.read_usize("trunk regular channels")?;
    let dilated_channels = reader.read_usize("trunk dilated channels")?;
    let gpool_channels = reader.read_usize("trunk gpool channels")?;

    let initial_conv = read_conv_exact(reader, num_input_channels, trunk_channels)?;
    let initial_matmul = read_matmul_exact(reader, num_input_global_channels, trunk_channels)?;

    // The declared count is untrusted until every block has been read.
    let mut blocks = Vec::with_capacity(num_blocks.min(64));
    for _ in 0..num_blocks {
        let offset = reader.peek_offset();
        let block = match reader.read_token("trunk block kind")? {
            "ordinary_block" => TrunkBlock::Ordinary(read_ordinary_block(
                reader,
                version,
                trunk_channels,
                mid_channels,
            )?),
            "gpool_block" => TrunkBlock::GlobalPooling(read_gpool_block(
                reader,
                version,
                trunk_channels,
                regular_channels,
                gpool_channels,
            )?),
            token => {
                return Err(ParseError::UnknownBlockKind {
                    token: token.to_string(),
                    offset,
                })
            }
        };
        log::debug!("Parsed trunk block '{}'", block.name());
        blocks.push(block);
    }

    let tip_norm = read_norm(reader, trunk_channels)?;
    let tip_activation = Activation::read(reader, version)?;

    Ok(TrunkDesc {
        trunk_channels,
        mid_channels,
        regular_channels,
        dilated_channels,
        gpool_channels,
        initial_conv,
        initial_matmul,
        blocks,
        tip_norm,
        tip_activation,
    })
}

fn read_ordinary_block(
    reader: &mut ModelReader,
    version: i32,
    trunk_channels: usize,
    mid_channels: usize,
) -> ParseResult<OrdinaryBlock> {
    let name = reader.read_token("block name")?.to_string();
    Ok(OrdinaryBlock {
        name,
        pre_norm: read_norm(reader, trunk_channels)?,
        pre_activation: Activation::read(reader, version)?,
        conv1: read_conv_exact(reader, trunk_channels, mid_channels)?,
        mid_norm: read_norm(reader, mid_channels)?,
        mid_activation: Activation::read(reader, version)?,
        conv2: read_conv_exact(reader, mid_channels, trunk_channels)?,
    })
}

fn read_gpool_block(
    reader: &mut ModelReader,
    version: i32,
    trunk_channels: usize,
    regular_channels: usize,
    gpool_channels: usize,
) -> ParseResult<GlobalPoolingBlock> {
    let name = reader.read_token("block name")?.to_string();
    Ok(GlobalPoolingBlock {
        name,
        pre_norm: read_norm(reader, trunk_channels)?,
        pre_activation: Activation::read(reader, version)?,
        regular_conv: read_conv_exact(reader, trunk_channels, regular_channels)?,
        gpool_conv: read_conv_exact(reader, trunk_channels, gpool_channels)?,
        gpool_norm: read_norm(reader, gpool_channels)?,
        gpool_activation: Activation::read(reader, version)?,
        gpool_to_bias: read_matmul_exact(reader, 3 * gpool_channels, regular_channels)?,
        mid_norm: read_norm(reader, regular_channels)?,
        mid_activation: Activation::read(reader, version)?,
        conv2: read_conv_exact(reader, regular_channels, trunk_channels)?,
    })
}

fn read_policy_head(
    reader: &mut ModelReader,
    version: i32,
    trunk_channels: usize,
) -> ParseResult<PolicyHeadDesc> {
    reader.expect_token("policyhead")?;

    let p1_conv = read_conv(reader, trunk_channels)?;
    let g1_conv = read_conv(reader, trunk_channels)?;
    let p1_channels = p1_conv.out_channels;
    let g1_channels = g1_conv.out_channels;

    let g1_norm = read_norm(reader, g1_channels)?;
    let g1_activation = Activation::read(reader, version)?;
    let gpool_to_bias = read_matmul_exact(reader, 3 * g1_channels, p1_channels)?;
    let p1_norm = read_norm(reader, p1_channels)?;
    let p1_activation = Activation::read(reader, version)?;
    let p2_conv = read_conv(reader, p1_channels)?;
    let pass_matmul = read_matmul_exact(reader, 3 * g1_channels, p2_conv.out_channels)?;

    Ok(PolicyHeadDesc {
        p1_conv,
        g1_conv,
        g1_norm,
        g1_activation,
        gpool_to_bias,
        p1_norm,
        p1_activation,
        p2_conv,
        pass_matmul,
    })
}

fn read_value_head(
    reader: &mut ModelReader,
    version: i32,
    trunk_channels: usize,
) -> ParseResult<ValueHeadDesc> {
    reader.expect_token("valuehead")?;

    let v1_conv = read_conv(reader, trunk_channels)?;
    let v1_channels = v1_conv.out_channels;
    let v1_norm = read_norm(reader, v1_channels)?;
    let v1_activation = Activation::read(reader, version)?;

    let v2_matmul = read_matmul(reader, 3 * v1_channels)?;
    let v2_channels = v2_matmul.out_channels;
    let v2_bias = read_bias(reader, v2_channels)?;
    let v2_activation = Activation::read(reader, version)?;

    let v3_matmul = read_matmul_exact(reader, v2_channels, VALUE_OUTPUTS)?;
    let v3_bias = read_bias(reader, VALUE_OUTPUTS)?;
    let sv3_matmul = read_matmul(reader, v2_channels)?;
    let sv3_bias = read_bias(reader, sv3_matmul.out_channels)?;
    let ownership_conv = read_conv_exact(reader, v1_channels, 1)?;

    Ok(ValueHeadDesc {
        v1_conv,
        v1_norm,
        v1_activation,
        v2_matmul,
        v2_bias,
        v2_activation,
        v3_matmul,
        v3_bias,
        sv3_matmul,
        sv3_bias,
        ownership_conv,
    })
}
