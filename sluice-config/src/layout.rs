#[derive(knuffel::DecodeScalar, Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum AttachMode {
    /// New views go on top of the wm stack.
    #[default]
    Top,
    /// New views go to the bottom of the wm stack.
    Bottom,
}

#[derive(knuffel::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Border drawn around every view, in logical pixels.
    #[knuffel(child, unwrap(argument), default = 2)]
    pub border_width: u16,
    #[knuffel(child, unwrap(argument), default)]
    pub attach_mode: AttachMode,
    /// Tags used while no output is connected.
    #[knuffel(child, unwrap(argument), default = 1)]
    pub default_tags: u32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            border_width: 2,
            attach_mode: AttachMode::Top,
            default_tags: 1,
        }
    }
}
