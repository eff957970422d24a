//! Per-kind JSON codecs, selected from a static lookup table.

use crate::schema::{
    AuthorityRule, DegradeRule, FlowRule, ParamFlowRule, RuleKind, RuleSchema, RuleSet, SystemRule,
};

use super::error::CodecError;

type DecodeFn = fn(&[u8]) -> Result<RuleSet, CodecError>;
type EncodeFn = fn(&RuleSet) -> Result<Vec<u8>, CodecError>;

/// Decoder/encoder pair for one rule kind's file format.
#[derive(Debug)]
pub struct Codec {
    kind: RuleKind,
    decode: DecodeFn,
    encode: EncodeFn,
}

static FLOW: Codec = Codec::of::<FlowRule>();
static DEGRADE: Codec = Codec::of::<DegradeRule>();
static SYSTEM: Codec = Codec::of::<SystemRule>();
static AUTHORITY: Codec = Codec::of::<AuthorityRule>();
static PARAM_FLOW: Codec = Codec::of::<ParamFlowRule>();

/// Look up the codec for a rule kind.
pub fn codec_for(kind: RuleKind) -> &'static Codec {
    match kind {
        RuleKind::Flow => &FLOW,
        RuleKind::Degrade => &DEGRADE,
        RuleKind::System => &SYSTEM,
        RuleKind::Authority => &AUTHORITY,
        RuleKind::ParamFlow => &PARAM_FLOW,
    }
}

impl Codec {
    const fn of<T: RuleSchema>() -> Self {
        Self {
            kind: T::KIND,
            decode: decode_as::<T>,
            encode: encode_as::<T>,
        }
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Decode raw file bytes. Empty or whitespace-only content is an empty set.
    pub fn decode(&self, bytes: &[u8]) -> Result<RuleSet, CodecError> {
        (self.decode)(bytes)
    }

    /// Encode a rule set as pretty JSON with a trailing newline.
    pub fn encode(&self, rules: &RuleSet) -> Result<Vec<u8>, CodecError> {
        (self.encode)(rules)
    }
}

fn decode_as<T: RuleSchema>(bytes: &[u8]) -> Result<RuleSet, CodecError> {
    let text = std::str::from_utf8(bytes)?;
    if text.trim().is_empty() {
        return Ok(T::into_set(Vec::new()));
    }
    let rules: Vec<T> = serde_json::from_str(text)?;
    validate_all(&rules)?;
    Ok(T::into_set(rules))
}

fn encode_as<T: RuleSchema>(set: &RuleSet) -> Result<Vec<u8>, CodecError> {
    let rules = T::from_set(set).ok_or(CodecError::KindMismatch {
        expected: T::KIND,
        actual: set.kind(),
    })?;
    // NaN and infinities would serialize as `null` and never decode back.
    validate_all(rules)?;
    let mut out = serde_json::to_vec_pretty(rules)?;
    out.push(b'\n');
    Ok(out)
}

fn validate_all<T: RuleSchema>(rules: &[T]) -> Result<(), CodecError> {
    for (index, rule) in rules.iter().enumerate() {
        rule.validate()
            .map_err(|reason| CodecError::InvalidRule { index, reason })?;
    }
    Ok(())
}
