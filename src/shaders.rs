//! Bundled WGSL programs, one per material kind.
//!
//! Every program is the shared prelude followed by the material's own module.

use crate::material::MaterialKind;

/// Shared prelude: the `Globals` block, vertex inputs, texture bindings and helpers.
pub const COMMON: &str = include_str!("shaders/common.wgsl");

const BASIC: &str = concat!(
    include_str!("shaders/common.wgsl"),
    include_str!("shaders/basic.wgsl")
);
const PHONG: &str = concat!(
    include_str!("shaders/common.wgsl"),
    include_str!("shaders/phong.wgsl")
);
const TOON: &str = concat!(
    include_str!("shaders/common.wgsl"),
    include_str!("shaders/toon.wgsl")
);
const REFLECT: &str = concat!(
    include_str!("shaders/common.wgsl"),
    include_str!("shaders/reflect.wgsl")
);
const REFRACT: &str = concat!(
    include_str!("shaders/common.wgsl"),
    include_str!("shaders/refract.wgsl")
);
const BACKGROUND: &str = concat!(
    include_str!("shaders/common.wgsl"),
    include_str!("shaders/background.wgsl")
);

/// Complete WGSL source of the program for `kind`.
pub fn source(kind: MaterialKind) -> &'static str {
    match kind {
        MaterialKind::Basic => BASIC,
        MaterialKind::Phong => PHONG,
        MaterialKind::Toon => TOON,
        MaterialKind::Reflect => REFLECT,
        MaterialKind::Refract => REFRACT,
        MaterialKind::Background => BACKGROUND,
    }
}
