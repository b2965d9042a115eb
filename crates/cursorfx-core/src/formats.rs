//! Ordered texture-format negotiation.
//!
//! Renderers describe what the device can do through a predicate; the search
//! walks fixed preference chains and returns the first usable format for each
//! channel layout, or [`FormatSupport::Unsupported`] if any layout has none.

/// Formats the renderers know how to use, independent of the graphics API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Rgba16Float,
    Rgba32Float,
    Rgba8Unorm,
    Rg16Float,
    Rg32Float,
    R16Float,
    R32Float,
}

pub const RGBA_CHAIN: &[FormatKind] = &[
    FormatKind::Rgba16Float,
    FormatKind::Rgba32Float,
    FormatKind::Rgba8Unorm,
];

/// Two-channel fields fall back to wider layouts before giving up.
pub const RG_CHAIN: &[FormatKind] = &[
    FormatKind::Rg16Float,
    FormatKind::Rg32Float,
    FormatKind::Rgba16Float,
    FormatKind::Rgba32Float,
];

pub const R_CHAIN: &[FormatKind] = &[
    FormatKind::R16Float,
    FormatKind::R32Float,
    FormatKind::Rg16Float,
    FormatKind::Rgba16Float,
    FormatKind::Rgba32Float,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldFormats {
    pub rgba: FormatKind,
    pub rg: FormatKind,
    pub r: FormatKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatSupport {
    Supported(FieldFormats),
    Unsupported,
}

impl FormatSupport {
    pub fn into_result(self) -> crate::Result<FieldFormats> {
        match self {
            FormatSupport::Supported(f) => Ok(f),
            FormatSupport::Unsupported => Err(crate::FxError::UnsupportedFormats),
        }
    }
}

fn first_supported(chain: &[FormatKind], supports: &impl Fn(FormatKind) -> bool) -> Option<FormatKind> {
    chain.iter().copied().find(|f| supports(*f))
}

pub fn negotiate_formats(supports: impl Fn(FormatKind) -> bool) -> FormatSupport {
    let found = (
        first_supported(RGBA_CHAIN, &supports),
        first_supported(RG_CHAIN, &supports),
        first_supported(R_CHAIN, &supports),
    );
    match found {
        (Some(rgba), Some(rg), Some(r)) => FormatSupport::Supported(FieldFormats { rgba, rg, r }),
        _ => FormatSupport::Unsupported,
    }
}
