// Field Layout Constants - SINGLE SOURCE OF TRUTH
//
// Every limit and default used by the layout engine lives here.

/// Axis limits
pub mod axes {
    /// Maximum number of distinct axes a layout may use
    pub const MAX_AXES: usize = 8;

    /// Conventional axis names, indexed by axis id
    pub const AXIS_NAMES: [&str; MAX_AXES] = ["i", "j", "k", "l", "m", "n", "o", "p"];
}

/// Backing buffer constants
pub mod memory {
    /// CPU cache line size, used as the default buffer alignment
    pub const CACHE_LINE_SIZE: usize = 64;

    /// Default alignment of a tree's backing buffer (bytes)
    pub const DEFAULT_BUFFER_ALIGNMENT: usize = CACHE_LINE_SIZE;

    /// Padding overhead ratio above which finalize logs a warning
    pub const PADDING_WARN_RATIO: f64 = 0.5;
}

/// Environment variables read by `LayoutConfig::from_env`
pub mod env {
    pub const PADDING: &str = "FIELD_LAYOUT_PADDING";
    pub const ALIGNMENT: &str = "FIELD_LAYOUT_ALIGNMENT";
}
