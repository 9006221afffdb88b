//! Page entry point.
//!
//! [`WebShell`] owns the shell and the browser host behind an
//! `Rc<RefCell<_>>`. DOM listeners and the frame callback hold weak
//! references and re-enter through [`with_runtime`], so dropping the
//! `WebShell` tears everything down.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Event, EventTarget, KeyboardEvent, PointerEvent, Window};

use rustico_shell::banner::Banner;
use rustico_shell::controller::ControllerLayout;
use rustico_shell::error::{Result, ShellError};
use rustico_shell::frame::FrameBuffer;
use rustico_shell::input::{HostEvent, Viewport, VirtualButton};
use rustico_shell::keymap::BindingRow;
use rustico_shell::power::IndicatorLook;
use rustico_shell::subscription::Topic;
use rustico_shell::surface::{SurfaceId, SurfaceSpec};
use rustico_shell::{
    ChromeBackend, EmulatorCore, FrameHandle, FrameScheduler, Mode, Shell, ShellConfig,
    SurfaceBackend,
};

use crate::canvas::CanvasSurfaces;
use crate::chrome::DomChrome;
use crate::dom::{self, ListenTarget};
use crate::js_core::JsCoreAdapter;
use crate::listeners::{EventListener, ListenerSet};
use crate::scheduler::RafScheduler;
use crate::storage::LocalSettings;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
}

/// Browser implementation of every shell backend.
struct WebHost {
    surfaces: CanvasSurfaces,
    chrome: DomChrome,
    scheduler: RafScheduler,
}

impl SurfaceBackend for WebHost {
    fn allocate(&mut self, spec: &SurfaceSpec) -> Result<()> {
        self.surfaces.allocate(spec)
    }

    fn release(&mut self, id: SurfaceId) -> Result<()> {
        self.surfaces.release(id)
    }

    fn set_visible(&mut self, id: SurfaceId, visible: bool) -> Result<()> {
        self.surfaces.set_visible(id, visible)
    }

    fn set_display_size(&mut self, id: SurfaceId, width: u32, height: u32) -> Result<()> {
        self.surfaces.set_display_size(id, width, height)
    }

    fn blit(&mut self, id: SurfaceId, frame: &FrameBuffer) -> Result<()> {
        self.surfaces.blit(id, frame)
    }
}

impl ChromeBackend for WebHost {
    fn set_indicator(&mut self, look: &IndicatorLook) -> Result<()> {
        self.chrome.set_indicator(look)
    }

    fn set_banner(&mut self, banner: Option<&Banner>) -> Result<()> {
        self.chrome.set_banner(banner)
    }

    fn set_debug(&mut self, text: &str, visible: bool) -> Result<()> {
        self.chrome.set_debug(text, visible)
    }

    fn set_controller(&mut self, layout: Option<&ControllerLayout>) -> Result<()> {
        self.chrome.set_controller(layout)
    }

    fn set_button_pressed(&mut self, button: VirtualButton, pressed: bool) -> Result<()> {
        self.chrome.set_button_pressed(button, pressed)
    }

    fn set_panel_visible(&mut self, panel: &str, visible: bool) -> Result<()> {
        self.chrome.set_panel_visible(panel, visible)
    }

    fn set_bindings(&mut self, rows: &[BindingRow], capturing: Option<VirtualButton>) -> Result<()> {
        self.chrome.set_bindings(rows, capturing)
    }

    fn request_fullscreen(&mut self, enter: bool) -> Result<()> {
        self.chrome.request_fullscreen(enter)
    }
}

impl FrameScheduler for WebHost {
    fn request_frame(&mut self) -> Result<FrameHandle> {
        self.scheduler.request_frame()
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.scheduler.cancel_frame(handle);
    }
}

struct Runtime {
    shell: Shell,
    host: WebHost,
    listeners: ListenerSet,
    window: Window,
    document: Document,
}

type SharedRuntime = Rc<RefCell<Runtime>>;

impl Runtime {
    /// Bring DOM listeners in line with the shell's live topics.
    fn sync_listeners(&mut self, weak: &Weak<RefCell<Runtime>>) {
        let live = self.shell.live_topics();
        let window = self.window.clone();
        let document = self.document.clone();
        let synced = self
            .listeners
            .sync(&live, |topic| attach(topic, &window, &document, weak));
        if let Err(e) = synced {
            log::error!("listener sync failed: {e}");
        }
    }

    /// Translate a native event. `None` for events the shell does not care
    /// about.
    fn translate(&self, name: &str, event: &Event) -> Option<HostEvent> {
        match name {
            "pointerdown" => {
                let pe = event.dyn_ref::<PointerEvent>()?;
                event.prevent_default();
                Some(HostEvent::PointerDown {
                    id: pe.pointer_id(),
                    x: pe.client_x(),
                    y: pe.client_y(),
                })
            },
            "pointerup" => Some(HostEvent::PointerUp {
                id: event.dyn_ref::<PointerEvent>()?.pointer_id(),
            }),
            "pointercancel" => Some(HostEvent::PointerCancel {
                id: event.dyn_ref::<PointerEvent>()?.pointer_id(),
            }),
            "resize" => Some(HostEvent::Resize(viewport_of(&self.window))),
            "orientationchange" => Some(HostEvent::OrientationChange(viewport_of(&self.window))),
            "fullscreenchange" => Some(HostEvent::FullscreenChanged(
                self.document.fullscreen_element().is_some(),
            )),
            "keydown" => {
                let ke = event.dyn_ref::<KeyboardEvent>()?;
                let code = ke.code();
                if self.shell.capture_target().is_some()
                    || self.shell.keymap().button_for(&code).is_some()
                {
                    event.prevent_default();
                }
                Some(HostEvent::KeyDown {
                    code,
                    repeat: ke.repeat(),
                })
            },
            "keyup" => Some(HostEvent::KeyUp {
                code: event.dyn_ref::<KeyboardEvent>()?.code(),
            }),
            "blur" => Some(HostEvent::FocusLost),
            "visibilitychange" => self.document.hidden().then_some(HostEvent::FocusLost),
            _ => None,
        }
    }
}

fn viewport_of(window: &Window) -> Viewport {
    let px = |v: std::result::Result<JsValue, JsValue>| {
        v.ok().and_then(|v| v.as_f64()).map_or(0, dom::css_px)
    };
    Viewport::new(px(window.inner_width()), px(window.inner_height()))
}

fn attach(
    topic: Topic,
    window: &Window,
    document: &Document,
    weak: &Weak<RefCell<Runtime>>,
) -> Result<Vec<EventListener>> {
    dom::dom_events(topic)
        .iter()
        .map(|&(target, name)| {
            let target: EventTarget = match target {
                ListenTarget::Window => window.clone().into(),
                ListenTarget::Document => document.clone().into(),
                ListenTarget::Controller => document
                    .get_element_by_id(dom::CONTROLLER_ID)
                    .ok_or_else(|| ShellError::Backend(format!("no element #{}", dom::CONTROLLER_ID)))?
                    .into(),
            };
            let weak = weak.clone();
            EventListener::new(&target, name, move |event: Event| {
                with_runtime(&weak, |rt| {
                    if let Some(host_event) = rt.translate(name, &event) {
                        rt.shell.handle_event(host_event, &mut rt.host);
                    }
                });
            })
        })
        .collect()
}

/// Run `f` against the live runtime, then resync listeners. Callbacks that
/// arrive while the runtime is already borrowed are dropped.
fn with_runtime<T>(weak: &Weak<RefCell<Runtime>>, f: impl FnOnce(&mut Runtime) -> T) -> Option<T> {
    let runtime = weak.upgrade()?;
    let Ok(mut guard) = runtime.try_borrow_mut() else {
        log::debug!("shell busy, dropping re-entrant callback");
        return None;
    };
    let rt = &mut *guard;
    let out = f(rt);
    rt.sync_listeners(weak);
    Some(out)
}

fn to_js(err: ShellError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

fn load_error(err: JsValue) -> ShellError {
    let detail = err
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .or_else(|| err.as_string())
        .unwrap_or_else(|| format!("{err:?}"));
    ShellError::Load(detail)
}

/// Call the page's loader and wait for the core object.
async fn load_core(loader: &js_sys::Function) -> Result<Box<dyn EmulatorCore>> {
    let returned = loader.call0(&JsValue::NULL).map_err(load_error)?;
    let value = JsFuture::from(js_sys::Promise::resolve(&returned))
        .await
        .map_err(load_error)?;
    Ok(Box::new(JsCoreAdapter::from_js(value)?))
}

/// The browser shell, exported to JS.
#[wasm_bindgen]
pub struct WebShell {
    runtime: SharedRuntime,
}

impl WebShell {
    fn with<T>(&self, f: impl FnOnce(&mut Runtime) -> Result<T>) -> std::result::Result<T, JsValue> {
        with_runtime(&Rc::downgrade(&self.runtime), f)
            .ok_or_else(|| JsValue::from_str("shell is busy"))?
            .map_err(to_js)
    }

    /// Read-only access. Fails instead of panicking when JS re-enters while
    /// the shell is borrowed.
    fn read<T>(&self, f: impl FnOnce(&Runtime) -> T) -> std::result::Result<T, JsValue> {
        let rt = self
            .runtime
            .try_borrow()
            .map_err(|_| JsValue::from_str("shell is busy"))?;
        Ok(f(&rt))
    }
}

#[wasm_bindgen]
impl WebShell {
    /// Build the shell against the current page. `config` is an optional
    /// `rustico.toml` document.
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<String>) -> std::result::Result<WebShell, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let config = match config {
            Some(text) => ShellConfig::from_toml(&text).map_err(to_js)?,
            None => ShellConfig::default(),
        };
        let settings = LocalSettings::open(&window);
        let shell = Shell::new(config, Box::new(settings), viewport_of(&window)).map_err(to_js)?;

        let runtime = Rc::new_cyclic(|weak: &Weak<RefCell<Runtime>>| {
            let frames = weak.clone();
            let scheduler = RafScheduler::new(window.clone(), move |handle, now| {
                with_runtime(&frames, |rt| {
                    rt.shell.on_animation_frame(handle, now, &mut rt.host);
                });
            });
            RefCell::new(Runtime {
                shell,
                host: WebHost {
                    surfaces: CanvasSurfaces::new(document.clone()),
                    chrome: DomChrome::new(document.clone()),
                    scheduler,
                },
                listeners: ListenerSet::default(),
                window,
                document,
            })
        });

        let weak = Rc::downgrade(&runtime);
        with_runtime(&weak, |rt| -> Result<()> {
            rt.shell.mount(&mut rt.host)?;
            let touch = rt.window.navigator().max_touch_points() > 0;
            rt.shell.handle_event(HostEvent::TouchCapability(touch), &mut rt.host);
            Ok(())
        })
        .unwrap_or(Ok(()))
        .map_err(to_js)?;
        log::info!("rustico shell mounted in {} mode", runtime.borrow().shell.active_mode());
        Ok(WebShell { runtime })
    }

    /// Load the emulation core through `loader` (a function returning the
    /// core object or a promise of it) and start the active mode's loop.
    /// Resolves to whether the core loaded. Call once.
    pub fn start(&self, loader: js_sys::Function) -> js_sys::Promise {
        let weak = Rc::downgrade(&self.runtime);
        wasm_bindgen_futures::future_to_promise(async move {
            let loaded = load_core(&loader).await;
            let ok = loaded.is_ok();
            with_runtime(&weak, |rt| rt.shell.attach_core(loaded, &mut rt.host));
            Ok(JsValue::from_bool(ok))
        })
    }

    /// Switch to `playfield`, `jam` or `configure-input`.
    pub fn activate(&self, mode: &str) -> std::result::Result<(), JsValue> {
        self.with(|rt| rt.shell.activate_id(mode, &mut rt.host))
    }

    #[wasm_bindgen(js_name = activeMode)]
    pub fn active_mode(&self) -> std::result::Result<String, JsValue> {
        self.read(|rt| rt.shell.active_mode().id().to_string())
    }

    #[wasm_bindgen(js_name = powerState)]
    pub fn power_state(&self) -> std::result::Result<String, JsValue> {
        self.read(|rt| rt.shell.power_state().id().to_string())
    }

    /// Set a mode's windowed scale factor (1 to 8). Persisted.
    #[wasm_bindgen(js_name = setScale)]
    pub fn set_scale(&self, mode: &str, factor: u32) -> std::result::Result<(), JsValue> {
        self.with(|rt| {
            let mode: Mode = mode.parse()?;
            rt.shell.set_scale(mode, factor, &mut rt.host)
        })
    }

    #[wasm_bindgen(js_name = requestFullscreen)]
    pub fn request_fullscreen(&self, enter: bool) -> std::result::Result<(), JsValue> {
        self.with(|rt| rt.shell.request_fullscreen(enter, &mut rt.host))
    }

    #[wasm_bindgen(js_name = dismissBanner)]
    pub fn dismiss_banner(&self) -> std::result::Result<(), JsValue> {
        self.with(|rt| {
            rt.shell.dismiss_banner(&mut rt.host);
            Ok(())
        })
    }

    /// Show or hide the debug block. Persisted.
    #[wasm_bindgen(js_name = setDebug)]
    pub fn set_debug(&self, enabled: bool) -> std::result::Result<(), JsValue> {
        self.with(|rt| {
            rt.shell.set_debug_enabled(enabled, &mut rt.host);
            Ok(())
        })
    }

    /// Bind the next key press to `button` (ConfigureInput mode only).
    #[wasm_bindgen(js_name = beginCapture)]
    pub fn begin_capture(&self, button: &str) -> std::result::Result<(), JsValue> {
        self.with(|rt| rt.shell.begin_capture_id(button, &mut rt.host))
    }

    #[wasm_bindgen(js_name = cancelCapture)]
    pub fn cancel_capture(&self) -> std::result::Result<(), JsValue> {
        self.with(|rt| {
            rt.shell.cancel_capture(&mut rt.host);
            Ok(())
        })
    }

    #[wasm_bindgen(js_name = resetBindings)]
    pub fn reset_bindings(&self) -> std::result::Result<(), JsValue> {
        self.with(|rt| rt.shell.reset_bindings(&mut rt.host))
    }

    /// Free the canvases of hidden modes. Returns how many were released.
    #[wasm_bindgen(js_name = reclaimSurfaces)]
    pub fn reclaim_surfaces(&self) -> std::result::Result<u32, JsValue> {
        self.with(|rt| rt.shell.reclaim_surfaces(&mut rt.host))
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
    }
}
