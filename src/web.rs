//! Web host: mounts widgets onto canvas elements.
//!
//! Assets are fetched relative to a base URL and images are decoded by the
//! browser. Each mounted widget owns a WebGL2 context, listens to pointer
//! events and renders from its own `requestAnimationFrame` loop until a
//! frame fails.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use wasm_bindgen_futures::JsFuture;

use crate::backend::{ImageData, WgpuBackend};
use crate::init_web_logging;
use crate::widget::{AssetError, AssetSource, Widget, WidgetFactory, WidgetKind};
use crate::{SystemClock, WidgetConfig};

type WebWidget = Widget<WgpuBackend, SystemClock>;

fn js_message(value: JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{:?}", value))
}

fn browser_window() -> Result<web_sys::Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("no global window exists"))
}

/// Assets fetched over HTTP relative to a base URL
#[derive(Debug, Clone)]
pub struct WebAssetSource {
    base: String,
}

impl WebAssetSource {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches("./");
        if self.base.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.base.trim_end_matches('/'), path)
        }
    }

    async fn fetch(&self, path: &str) -> Result<web_sys::Response, AssetError> {
        let fetch_error = |message: String| AssetError::Fetch {
            path: path.to_string(),
            message,
        };
        let window = browser_window().map_err(|e| fetch_error(js_message(e)))?;
        let value = JsFuture::from(window.fetch_with_str(&self.url(path)))
            .await
            .map_err(|e| fetch_error(js_message(e)))?;
        let response: web_sys::Response = value
            .dyn_into()
            .map_err(|e| fetch_error(js_message(e)))?;

        match response.status() {
            _ if response.ok() => Ok(response),
            404 => Err(AssetError::NotFound {
                path: path.to_string(),
            }),
            status => Err(fetch_error(format!("HTTP {}", status))),
        }
    }
}

impl AssetSource for WebAssetSource {
    async fn load_bytes(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        let response = self.fetch(path).await?;
        let fetch_error = |e: JsValue| AssetError::Fetch {
            path: path.to_string(),
            message: js_message(e),
        };
        let buffer = JsFuture::from(response.array_buffer().map_err(fetch_error)?)
            .await
            .map_err(fetch_error)?;
        Ok(js_sys::Uint8Array::new(&buffer).to_vec())
    }

    async fn load_text(&self, path: &str) -> Result<String, AssetError> {
        let response = self.fetch(path).await?;
        let fetch_error = |e: JsValue| AssetError::Fetch {
            path: path.to_string(),
            message: js_message(e),
        };
        let text = JsFuture::from(response.text().map_err(fetch_error)?)
            .await
            .map_err(fetch_error)?;
        text.as_string().ok_or_else(|| AssetError::NotText {
            path: path.to_string(),
        })
    }

    /// Decode through an `<img>` element so every browser format (SVG
    /// included) works, then read the pixels back through a 2D canvas.
    async fn load_image(&self, path: &str) -> Result<ImageData, AssetError> {
        let fetch_error = |e: JsValue| AssetError::Fetch {
            path: path.to_string(),
            message: js_message(e),
        };
        let image = web_sys::HtmlImageElement::new().map_err(fetch_error)?;
        image.set_cross_origin(Some("anonymous"));
        image.set_src(&self.url(path));
        JsFuture::from(image.decode()).await.map_err(fetch_error)?;

        let (width, height) = (image.natural_width(), image.natural_height());
        let document = browser_window()
            .ok()
            .and_then(|w| w.document())
            .ok_or_else(|| fetch_error(JsValue::from_str("no document exists")))?;
        let canvas: web_sys::HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(fetch_error)?
            .dyn_into()
            .map_err(|e| fetch_error(e.into()))?;
        canvas.set_width(width);
        canvas.set_height(height);

        let context: web_sys::CanvasRenderingContext2d = canvas
            .get_context("2d")
            .map_err(fetch_error)?
            .ok_or_else(|| fetch_error(JsValue::from_str("2d context unavailable")))?
            .dyn_into()
            .map_err(|e| fetch_error(e.into()))?;
        context
            .draw_image_with_html_image_element(&image, 0.0, 0.0)
            .map_err(fetch_error)?;
        let pixels = context
            .get_image_data(0.0, 0.0, width as f64, height as f64)
            .map_err(fetch_error)?;
        let Clamped(rgba) = pixels.data();

        log::debug!("Decoded image {} ({}x{})", path, width, height);
        Ok(ImageData::new(width, height, rgba))
    }
}

/// Size the canvas backing store to its CSS size times the pixel ratio
fn fit_canvas(canvas: &web_sys::HtmlCanvasElement) {
    let ratio = web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .unwrap_or(1.0);
    canvas.set_width((canvas.client_width() as f64 * ratio) as u32);
    canvas.set_height((canvas.client_height() as f64 * ratio) as u32);
}

fn set_cursor(canvas: &web_sys::HtmlCanvasElement, cursor: &str) {
    if let Err(e) = canvas.style().set_property("cursor", cursor) {
        log::warn!("Failed to set cursor: {}", js_message(e));
    }
}

fn listen<E, F>(target: &web_sys::EventTarget, event: &str, handler: F) -> Result<(), JsValue>
where
    E: JsCast + 'static,
    F: FnMut(E) + 'static,
    E: wasm_bindgen::convert::FromWasmAbi,
{
    let closure = Closure::<dyn FnMut(E)>::new(handler);
    target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
    // Widgets live as long as the page
    closure.forget();
    Ok(())
}

fn attach_input(
    window: &web_sys::Window,
    canvas: &web_sys::HtmlCanvasElement,
    widget: &Rc<RefCell<WebWidget>>,
) -> Result<(), JsValue> {
    set_cursor(canvas, "grab");

    {
        let widget = widget.clone();
        let canvas = canvas.clone();
        listen(window, "mousemove", move |event: web_sys::MouseEvent| {
            let bounds = canvas.get_bounding_client_rect();
            let center = Vec2::new(
                (bounds.x() + bounds.width() / 2.0) as f32,
                (bounds.y() + bounds.height() / 2.0) as f32,
            );
            let pointer = Vec2::new(event.client_x() as f32, event.client_y() as f32);
            widget.borrow_mut().pointer_moved(pointer, center);
        })?;
    }
    for (name, hovered) in [("mouseenter", true), ("mouseleave", false)] {
        let widget = widget.clone();
        listen(canvas, name, move |_: web_sys::MouseEvent| {
            widget.borrow_mut().set_hovered(hovered);
        })?;
    }
    {
        let target = canvas.clone();
        listen(canvas, "mousedown", move |_: web_sys::MouseEvent| {
            set_cursor(&target, "grabbing");
        })?;
    }
    {
        let target = canvas.clone();
        listen(window, "mouseup", move |_: web_sys::MouseEvent| {
            set_cursor(&target, "grab");
        })?;
    }
    {
        let target = canvas.clone();
        listen(window, "resize", move |_: web_sys::Event| fit_canvas(&target))?;
    }
    Ok(())
}

/// Render every display refresh until a frame fails
fn start_render_loop(canvas: web_sys::HtmlCanvasElement, widget: Rc<RefCell<WebWidget>>) {
    let frame: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let next = frame.clone();
    let kind = widget.borrow().kind();

    *frame.borrow_mut() = Some(Closure::new(move || {
        let viewport = (canvas.width(), canvas.height());
        if let Err(e) = widget.borrow_mut().render_frame(viewport) {
            log::error!("{} widget stopped: {}", kind, e);
            return;
        }
        if let Some(callback) = next.borrow().as_ref() {
            request_frame(callback);
        }
    }));

    if let Some(callback) = frame.borrow().as_ref() {
        request_frame(callback);
    }
}

fn request_frame(callback: &Closure<dyn FnMut()>) {
    let requested = web_sys::window()
        .map(|w| w.request_animation_frame(callback.as_ref().unchecked_ref()));
    if let Some(Err(e)) = requested {
        log::error!("requestAnimationFrame failed: {}", js_message(e));
    }
}

async fn mount(
    factory: WidgetFactory,
    assets: Rc<WebAssetSource>,
    canvas: web_sys::HtmlCanvasElement,
    kind: WidgetKind,
) -> Result<(), JsValue> {
    let window = browser_window()?;
    fit_canvas(&canvas);

    let to_js = |e: crate::WidgetError| JsValue::from_str(&e.to_string());
    let backend = WgpuBackend::from_canvas(canvas.clone())
        .await
        .map_err(|e| to_js(e.into()))?;
    let widget = factory
        .create(backend, kind, assets.as_ref())
        .await
        .map_err(|e| {
            log::error!("Failed to set up {} widget: {}", kind, e);
            to_js(e)
        })?;
    let widget = Rc::new(RefCell::new(widget));

    attach_input(&window, &canvas, &widget)?;
    start_render_loop(canvas, widget);
    Ok(())
}

/// Entry point for pages: one host per page, one `mount` per canvas
#[wasm_bindgen]
pub struct WidgetHost {
    factory: WidgetFactory,
    assets: Rc<WebAssetSource>,
}

#[wasm_bindgen]
impl WidgetHost {
    #[wasm_bindgen(constructor)]
    pub fn new(asset_base: String) -> WidgetHost {
        init_web_logging();
        log::info!("Widget host using assets from `{}`", asset_base);
        WidgetHost {
            factory: WidgetFactory::new(WidgetConfig::default()),
            assets: Rc::new(WebAssetSource::new(asset_base)),
        }
    }

    /// Use a different color texture for the star variants, for example
    /// an SVG the browser can rasterize
    #[wasm_bindgen(js_name = setStarTexture)]
    pub fn set_star_texture(&mut self, path: String) {
        let config = self.factory.config().clone().with_star_texture(path);
        self.factory = WidgetFactory::new(config);
    }

    /// Set up a widget of `kind` (a name such as `"diamond"` or a numeric
    /// id) on `canvas`. The promise rejects with a message when setup fails.
    pub fn mount(&self, canvas: web_sys::HtmlCanvasElement, kind: String) -> js_sys::Promise {
        let factory = self.factory.clone();
        let assets = self.assets.clone();
        wasm_bindgen_futures::future_to_promise(async move {
            let kind: WidgetKind = kind
                .parse()
                .map_err(|e: crate::widget::UnknownKind| JsValue::from_str(&e.to_string()))?;
            mount(factory, assets, canvas, kind).await?;
            Ok(JsValue::UNDEFINED)
        })
    }
}
