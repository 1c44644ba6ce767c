//! # Widget Viewer
//!
//! Opens a native window and renders one widget from an asset directory.
//! Hover the window to tilt the model toward the cursor.
//!
//! ```text
//! cargo run --example viewer -- --kind diamond --assets ./public
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use glam::Vec2;
use ornaments::widget::FsAssetSource;
use ornaments::{WgpuBackend, WidgetFactory, WidgetKind};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

/// Native viewer for the decorative widgets
#[derive(Parser, Debug)]
#[command(name = "viewer", about = "Render an ornament widget in a window")]
struct Args {
    /// Widget variant: a name (star, golden-star, diamond) or numeric id
    #[arg(long, default_value = "star")]
    kind: WidgetKind,

    /// Directory holding the shaders/ and models/ folders
    #[arg(long, default_value = ".")]
    assets: PathBuf,

    /// Initial window width in pixels
    #[arg(long, default_value = "300")]
    width: u32,

    /// Initial window height in pixels
    #[arg(long, default_value = "300")]
    height: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(format!("Ornament: {}", args.kind))
            .with_inner_size(PhysicalSize::new(args.width, args.height))
            .build(&event_loop)?,
    );

    let backend = pollster::block_on(WgpuBackend::from_window(Arc::clone(&window)))?;
    let assets = FsAssetSource::new(&args.assets);
    let mut widget = pollster::block_on(WidgetFactory::default().create(backend, args.kind, &assets))?;
    log::info!("Showing {} from {}", args.kind, args.assets.display());

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::CursorMoved { position, .. } => {
                    let size = window.inner_size();
                    let center = Vec2::new(size.width as f32, size.height as f32) / 2.0;
                    widget.pointer_moved(Vec2::new(position.x as f32, position.y as f32), center);
                }
                WindowEvent::CursorEntered { .. } => widget.set_hovered(true),
                WindowEvent::CursorLeft { .. } => widget.set_hovered(false),
                WindowEvent::RedrawRequested => {
                    let size = window.inner_size();
                    if let Err(e) = widget.render_frame((size.width, size.height)) {
                        log::error!("Rendering stopped: {}", e);
                        elwt.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            _ => {}
        }
    })?;

    Ok(())
}
