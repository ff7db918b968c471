use std::path::PathBuf;

use dicom_stack::{LoaderConfig, VolumeLoader};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let directory = args.next().map_or_else(|| PathBuf::from("dicom"), PathBuf::from);
    let loader = match args.next() {
        Some(config) => VolumeLoader::from_toml_file(config).expect("should have read loader config"),
        None => VolumeLoader::new(LoaderConfig::default()),
    };

    let loaded = loader
        .load_from_directory(&directory)
        .expect("should have loaded files from directory");
    for failure in &loaded.report.failures {
        eprintln!("skipped {failure}");
    }
    let volume = loaded.volume;
    println!("{volume}");

    let window = volume.window_interpolator();
    let image = volume
        .slice_image(0, volume.num_slices() / 2, &window)
        .expect("should have returned image at center of volume");
    image.save("result.png").expect("should have saved result.png");
}
