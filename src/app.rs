//! Thin eframe application shell hosting a spy plot widget

use std::cell::RefCell;
use std::rc::Rc;

use crate::widget::SpyPlotWidget;

/// The egui application for the viewer.
///
/// The widget is shared so the browser handle can drive it between frames.
pub struct SpyViewerApp {
    widget: Rc<RefCell<SpyPlotWidget>>,
}

impl SpyViewerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, widget: Rc<RefCell<SpyPlotWidget>>) -> Self {
        Self { widget }
    }
}

impl eframe::App for SpyViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let size = ui.available_size();
            self.widget.borrow_mut().show(ui, size);
        });
    }
}
