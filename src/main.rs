use std::path::PathBuf;

use clap::Parser;

/// Shows one model from the registry on a lit stage.
///
/// Arrow keys move the model up and down, `R` resets the camera.
#[derive(Debug, Parser)]
#[command(version, about)]
#[cfg_attr(target_arch = "wasm32", allow(dead_code))]
struct Args {
    /// Registry key of the model to show.
    key: Option<String>,
    /// Directory holding `modelList.json` and the model files.
    #[arg(long, default_value = "assets")]
    assets: PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    use model_stage::{controls::KeyboardControls, resources::AssetSource};

    let args = Args::parse();
    let controls = KeyboardControls::new(model_stage::config::ViewerConfig::default().offset_step);
    model_stage::run_viewer(
        AssetSource::directory(args.assets),
        args.key.filter(|k| !k.is_empty()),
        Box::new(controls),
    )
}

// The web build starts from the library's `start` entry point.
#[cfg(target_arch = "wasm32")]
fn main() {}
