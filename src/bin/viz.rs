use eframe::egui;
use egui_plot::{Line, Plot, PlotPoints};
use nalgebra::Vector3;

use throttle_avionics::sim::{simulate, HoverPlant, Pipeline, SimConfig, TelemetryRecord};
use throttle_avionics::{Globals, VerticalMode, VesselConfig};

fn main() -> eframe::Result {
    let mut plant = HoverPlant::quad(1200.0, 6000.0, 1.5)
        .with_com(Vector3::new(0.25, 0.0, 0.0))
        .with_slow_engines(0.8, 1.2);
    let cfg = VesselConfig {
        enabled: true,
        vertical_mode: VerticalMode::Altitude,
        desired_altitude: 50.0,
        ..VesselConfig::default()
    };
    let mut pipeline = Pipeline::new(Globals::default(), cfg);
    let records = simulate(&mut plant, &mut pipeline, &SimConfig { dt: 0.02, max_time: 60.0 });

    let app = ControlViz { records, title: "Quad lander, slow engines, 50 m hold".into() };
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };
    eframe::run_native("Throttle Avionics", options, Box::new(|_| Ok(Box::new(app))))
}

struct ControlViz {
    records: Vec<TelemetryRecord>,
    title: String,
}

fn series<F>(records: &[&TelemetryRecord], f: F) -> PlotPoints<'static>
where
    F: Fn(&TelemetryRecord) -> f64,
{
    records.iter().map(|r| [r.time, f(r)]).collect()
}

impl eframe::App for ControlViz {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let step = (self.records.len() / 2000).max(1);
        let sampled: Vec<&TelemetryRecord> = self.records.iter().step_by(step).collect();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.heading(&self.title);
            let peak = self.records.iter().map(|r| r.altitude).fold(0.0_f64, f64::max);
            ui.label(format!(
                "Peak: {:.1} m  |  Final: {:.1} m  |  Ticks: {}",
                peak,
                self.records.last().map_or(0.0, |r| r.altitude),
                self.records.len(),
            ));
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_size();
            let half_w = available.x / 2.0 - 8.0;
            let half_h = available.y / 2.0 - 8.0;

            ui.horizontal(|ui| {
                ui.vertical(|ui| {
                    ui.label("Altitude (m)");
                    Plot::new("altitude")
                        .width(half_w)
                        .height(half_h)
                        .x_axis_label("Time (s)")
                        .show(ui, |plot_ui| {
                            plot_ui.line(Line::new("Altitude", series(&sampled, |r| r.altitude)));
                            plot_ui.line(Line::new("Desired", series(&sampled, |r| r.desired_altitude)));
                        });
                });

                ui.vertical(|ui| {
                    ui.label("Vertical speed (m/s)");
                    Plot::new("vertical_speed")
                        .width(half_w)
                        .height(half_h)
                        .x_axis_label("Time (s)")
                        .show(ui, |plot_ui| {
                            plot_ui.line(Line::new("Vertical speed", series(&sampled, |r| r.vertical_speed)));
                            plot_ui.line(Line::new("Setpoint", series(&sampled, |r| r.setpoint)));
                        });
                });
            });

            ui.horizontal(|ui| {
                ui.vertical(|ui| {
                    ui.label("Vertical speed factor");
                    Plot::new("vsf")
                        .width(half_w)
                        .height(half_h)
                        .x_axis_label("Time (s)")
                        .show(ui, |plot_ui| {
                            plot_ui.line(Line::new("VSF", series(&sampled, |r| r.vsf)));
                        });
                });

                ui.vertical(|ui| {
                    ui.label("Thrust limits");
                    Plot::new("limits")
                        .width(half_w)
                        .height(half_h)
                        .x_axis_label("Time (s)")
                        .show(ui, |plot_ui| {
                            plot_ui.line(Line::new("Lowest", series(&sampled, |r| r.min_limit)));
                            plot_ui.line(Line::new("Highest", series(&sampled, |r| r.max_limit)));
                        });
                });
            });
        });
    }
}
