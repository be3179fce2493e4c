//! Visualization utilities for rust_codriving
//!
//! Renders control zones and recorded agent paths with gnuplot.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::common::Point2D;
use crate::map::ControlNodeGraph;

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const BLUE: &str = "#0000FF";
    pub const GRAY: &str = "#808080";

    // Semantic colors
    pub const CONTROL_NODE: &str = BLACK;
    pub const EXCLUDED_NODE: &str = GRAY;
    pub const CONTROL_ZONE: &str = "#35C788";
    pub const NATIVE_PATH: &str = BLUE;
    pub const PREDICTED_PATH: &str = RED;
}

/// Style for path rendering
#[derive(Debug, Clone)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self::new(colors::NATIVE_PATH, "Path")
    }
}

/// Points of a circle of `radius` around `center`
pub fn circle_points(center: Point2D, radius: f64, segments: usize) -> (Vec<f64>, Vec<f64>) {
    (0..=segments)
        .map(|i| {
            let theta = 2.0 * std::f64::consts::PI * i as f64 / segments as f64;
            (center.x + radius * theta.cos(), center.y + radius * theta.sin())
        })
        .unzip()
}

/// One plotted series, rendered when the figure is saved
#[derive(Debug, Clone)]
enum Series {
    Lines { x: Vec<f64>, y: Vec<f64>, style: PathStyle },
    Marker { x: f64, y: f64, color: &'static str, caption: &'static str },
}

/// Main visualizer struct
///
/// Series are collected first and drawn onto a single set of axes on save.
pub struct Visualizer {
    series: Vec<Series>,
    title: String,
    x_label: String,
    y_label: String,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
}

impl Visualizer {
    pub fn new() -> Self {
        Self {
            series: Vec::new(),
            title: String::new(),
            x_label: "X [m]".to_string(),
            y_label: "Y [m]".to_string(),
            x_range: None,
            y_range: None,
        }
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.x_range = Some((min, max));
        self
    }

    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.y_range = Some((min, max));
        self
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Plot every control node and the control radius around the active ones
    pub fn plot_control_nodes(&mut self, nodes: &ControlNodeGraph, control_radius: f64) -> &mut Self {
        for node in nodes.nodes() {
            let excluded = nodes.is_excluded(&node.id);
            let (color, caption) = if excluded {
                (colors::EXCLUDED_NODE, "Excluded node")
            } else {
                (colors::CONTROL_NODE, "Control node")
            };
            self.series.push(Series::Marker { x: node.coord.x, y: node.coord.y, color, caption });

            if !excluded {
                let (x, y) = circle_points(node.coord, control_radius, 64);
                let style = PathStyle::new(colors::CONTROL_ZONE, "").with_line_width(1.0);
                self.series.push(Series::Lines { x, y, style });
            }
        }
        self
    }

    /// Plot an agent path
    pub fn plot_path(&mut self, points: &[Point2D], style: &PathStyle) -> &mut Self {
        let (x, y) = points.iter().map(|p| (p.x, p.y)).unzip();
        self.series.push(Series::Lines { x, y, style: style.clone() });
        self
    }

    /// Save plot to PNG file
    pub fn save_png(&self, path: &str, width: u32, height: u32) -> Result<(), String> {
        let mut figure = self.render();
        figure.save_to_png(path, width, height).map_err(|e| e.to_string())
    }

    fn render(&self) -> Figure {
        let mut figure = Figure::new();
        let axes = figure.axes2d();

        for series in &self.series {
            match series {
                Series::Lines { x, y, style } => {
                    axes.lines(x, y, &[
                        Caption(&style.caption),
                        Color(&style.color),
                        LineWidth(style.line_width),
                    ]);
                }
                Series::Marker { x, y, color, caption } => {
                    axes.points(&[*x], &[*y], &[
                        Caption(*caption),
                        Color(*color),
                        PointSymbol('S'),
                        PointSize(1.5),
                    ]);
                }
            }
        }

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label(&self.x_label, &[]);
        axes.set_y_label(&self.y_label, &[]);

        if let Some((min, max)) = self.x_range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.y_range {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        axes.set_aspect_ratio(AutoOption::Fix(1.0));

        figure
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}
