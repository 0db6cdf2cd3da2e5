pub mod stats_panel;
pub mod terminal_sink;
pub mod window_sink;
