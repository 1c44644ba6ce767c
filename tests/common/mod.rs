//! Shared fixtures for widget integration tests.

#![allow(dead_code)]

use ornaments::backend::{HeadlessBackend, HeadlessCommand, ImageData};
use ornaments::resources::{mesh_file, FaceIndex, Mesh};
use ornaments::widget::MemoryAssetSource;
use ornaments::{ManualClock, Widget, WidgetConfig, WidgetError, WidgetFactory, WidgetKind};

pub const VERTEX_SHADER: &str = include_str!("../../shaders/vertex.wgsl");
pub const STAR_SHADER: &str = include_str!("../../shaders/star.wgsl");
pub const DIAMOND_SHADER: &str = include_str!("../../shaders/diamond.wgsl");

/// A tetrahedron: 4 triangles, 12 corners
pub fn tetrahedron() -> Mesh {
    Mesh::new(
        vec![
            0.0, 1.0, 0.0, //
            -1.0, -1.0, 1.0, //
            1.0, -1.0, 1.0, //
            0.0, -1.0, -1.0,
        ],
        vec![0.5, 1.0, 0.0, 0.0, 1.0, 0.0, 0.5, 0.5],
        vec![
            0.0, 0.5, 1.0, //
            1.0, 0.5, -0.5, //
            -1.0, 0.5, -0.5, //
            0.0, -1.0, 0.0,
        ],
        vec![
            FaceIndex::new(0, 0, 0),
            FaceIndex::new(1, 1, 0),
            FaceIndex::new(2, 2, 0),
            FaceIndex::new(0, 0, 1),
            FaceIndex::new(2, 2, 1),
            FaceIndex::new(3, 3, 1),
            FaceIndex::new(0, 0, 2),
            FaceIndex::new(3, 3, 2),
            FaceIndex::new(1, 1, 2),
            FaceIndex::new(1, 1, 3),
            FaceIndex::new(3, 3, 3),
            FaceIndex::new(2, 2, 3),
        ],
    )
    .expect("tetrahedron indices are in range")
}

/// Every asset the default configuration refers to
pub fn assets() -> MemoryAssetSource {
    let config = WidgetConfig::default();
    let mesh = mesh_file::encode(&tetrahedron());

    let mut assets = MemoryAssetSource::new()
        .with(config.vertex_shader.clone(), VERTEX_SHADER)
        .with(config.star_shader.clone(), STAR_SHADER)
        .with(config.diamond_shader.clone(), DIAMOND_SHADER)
        .with(config.star_model.clone(), mesh.clone())
        .with_image(config.star_texture.clone(), ImageData::solid([255, 220, 90, 255]))
        .with_image(config.normal_map.clone(), ImageData::solid([128, 128, 255, 255]));
    for path in &config.diamond_models {
        assets.insert(path.clone(), mesh.clone());
    }
    assets
}

/// Set up a widget on a 300x300 headless backend driven by `clock`
pub fn create_widget(
    kind: WidgetKind,
    assets: &MemoryAssetSource,
    clock: &ManualClock,
) -> Result<Widget<HeadlessBackend, ManualClock>, WidgetError> {
    pollster::block_on(WidgetFactory::default().create_with_clock(
        HeadlessBackend::default(),
        kind,
        assets,
        clock.clone(),
    ))
}

/// Draw commands of a frame
pub fn draws(frame: &[HeadlessCommand]) -> Vec<&HeadlessCommand> {
    frame
        .iter()
        .filter(|c| matches!(c, HeadlessCommand::Draw { .. }))
        .collect()
}
