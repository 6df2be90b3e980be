use std::path::PathBuf;
use std::sync::Arc;

use dicom_contour::{
    DicomSliceDecoder, EditingSession, Interpolation, Prefetcher, SliceCache, SliceStack,
    ViewerConfig, load_structure_set, prefetch_window,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let directory = args.next().map_or_else(|| PathBuf::from("dicom"), PathBuf::from);
    let config = match args.next() {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };

    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    let decoder = Arc::new(DicomSliceDecoder::scan_directory(&directory)?);
    let prefetcher = Prefetcher::new(
        decoder.clone(),
        Arc::new(SliceCache::new()),
        config.prefetch.concurrency,
    );
    // Files are usually named in acquisition order, so the middle of the
    // listing is decoded first and the rest follows.
    let keys = decoder.keys();
    let first = prefetch_window(&keys, keys.len() / 2, config.prefetch.radius);
    prefetcher.prefetch(first).await;
    prefetcher.prefetch(keys.clone()).await;
    if prefetcher.cache().is_empty() {
        log::error!("No slices could be decoded from {}", directory.display());
        return Ok(());
    }

    let slices = keys
        .iter()
        .filter_map(|key| prefetcher.cache().get(key))
        .collect();
    let stack = SliceStack::new(slices, config.sort_by, config.slice_tolerance);
    let mut session = EditingSession::new(stack, config);

    // Only the neighbourhood of the displayed slice stays cached.
    let window = session.prefetch_keys();
    let evicted = prefetcher.cache().retain(|key| window.contains(key));
    log::debug!("Keeping {} slices cached, evicted {evicted}", window.len());

    let rtstruct = directory.join("rtstruct.dcm");
    let frame = session.current_slice().map(|slice| *slice.geometry());
    if let (true, Some(frame)) = (rtstruct.exists(), frame) {
        let rejected = session.import_structures(load_structure_set(&rtstruct, &frame)?);
        log::info!("{} contours rejected on import", rejected.len());
    }

    if let Some(image) = session.render_slice() {
        image.save("axial.png")?;
        log::info!("Saved slice {} to axial.png", session.current_index());
    }

    let volume = session.volume()?;
    let sagittal = volume.sagittal_plane(volume.dim().2 / 2, Interpolation::Bilinear)?;
    if let Some(image) = sagittal.render(session.window()) {
        image.save("sagittal.png")?;
        log::info!("Saved sagittal plane to sagittal.png");
    }
    Ok(())
}
