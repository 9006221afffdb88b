//! DOM chrome: indicator, banner, debug block, controller overlay, panels.

use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement};

use rustico_shell::ChromeBackend;
use rustico_shell::banner::Banner;
use rustico_shell::controller::ControllerLayout;
use rustico_shell::error::{Result, ShellError};
use rustico_shell::input::VirtualButton;
use rustico_shell::keymap::BindingRow;
use rustico_shell::power::IndicatorLook;

use crate::{dom, js_error};

pub struct DomChrome {
    document: Document,
}

impl DomChrome {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    fn element(&self, id: &str) -> Result<Element> {
        self.document
            .get_element_by_id(id)
            .ok_or_else(|| ShellError::Backend(format!("no element #{id}")))
    }

    fn html(&self, id: &str) -> Result<HtmlElement> {
        self.element(id)?
            .dyn_into::<HtmlElement>()
            .map_err(|_| ShellError::Backend(format!("#{id} is not an HTML element")))
    }
}

impl ChromeBackend for DomChrome {
    fn set_indicator(&mut self, look: &IndicatorLook) -> Result<()> {
        let el = self.element(dom::INDICATOR_ID)?;
        el.set_class_name(&dom::indicator_classes(look));
        el.set_attribute("style", &dom::indicator_style(look))
            .map_err(|e| js_error("indicator style", e))?;
        el.set_attribute("data-state", look.state.id())
            .map_err(|e| js_error("indicator state", e))
    }

    fn set_banner(&mut self, banner: Option<&Banner>) -> Result<()> {
        let el = self.element(dom::BANNER_ID)?;
        el.set_class_name(&dom::banner_classes(banner));
        let text = self.element(dom::BANNER_TEXT_ID)?;
        text.set_text_content(banner.map(|b| b.message.as_str()));
        Ok(())
    }

    fn set_debug(&mut self, text: &str, visible: bool) -> Result<()> {
        let el = self.html(dom::DEBUG_ID)?;
        el.set_text_content(Some(text));
        el.set_hidden(!visible);
        Ok(())
    }

    fn set_controller(&mut self, layout: Option<&ControllerLayout>) -> Result<()> {
        let overlay = self.element(dom::CONTROLLER_ID)?;
        overlay.set_class_name(dom::controller_classes(layout));
        for button in VirtualButton::ALL {
            let el = self.element(&dom::button_element_id(button))?;
            let classes = dom::relayout_button_classes(button, layout.is_some(), &el.class_name());
            el.set_class_name(&classes);
            if let Some(placement) = layout.and_then(|l| l.placement(button)) {
                el.set_attribute("style", &dom::rect_style(&placement.rect))
                    .map_err(|e| js_error("button style", e))?;
            }
        }
        Ok(())
    }

    fn set_button_pressed(&mut self, button: VirtualButton, pressed: bool) -> Result<()> {
        self.element(&dom::button_element_id(button))?
            .class_list()
            .toggle_with_force(dom::PRESSED_CLASS, pressed)
            .map(|_| ())
            .map_err(|e| js_error("button class", e))
    }

    fn set_panel_visible(&mut self, panel: &str, visible: bool) -> Result<()> {
        self.html(panel)?.set_hidden(!visible);
        Ok(())
    }

    fn set_bindings(&mut self, rows: &[BindingRow], capturing: Option<VirtualButton>) -> Result<()> {
        self.element(dom::BINDINGS_ID)?
            .set_inner_html(&dom::bindings_html(rows, capturing));
        Ok(())
    }

    fn request_fullscreen(&mut self, enter: bool) -> Result<()> {
        if enter {
            self.document
                .document_element()
                .ok_or_else(|| ShellError::Backend("document has no root element".into()))?
                .request_fullscreen()
                .map_err(|e| js_error("requestFullscreen", e))
        } else {
            if self.document.fullscreen_element().is_some() {
                self.document.exit_fullscreen();
            }
            Ok(())
        }
    }
}
