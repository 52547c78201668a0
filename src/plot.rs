use crate::error::{Error, Result};

use std::io::Write;
use tracing::warn;

/// Smallest sampling step `plot` accepts.
pub const MIN_INCREMENT: f64 = 0.0001;

/// Output side of the `plot` keyword.
pub trait PlotRenderer {
    /// Draw the curve `f(x)=<name>(x)` through the sampled points.
    fn render(&mut self, name: &str, xs: &[f64], ys: &[f64]);
}

/// Most samples a single plot may take.
pub const MAX_SAMPLES: usize = 1_000_000;

/// Sample points `lower, lower + increment, ...` up to and including `upper`.
pub fn sample_range(lower: f64, upper: f64, increment: f64) -> Result<Vec<f64>> {
    if increment < MIN_INCREMENT {
        return Err(Error::Value(format!(
            "Plotting increment can not be less than {MIN_INCREMENT}"
        )));
    }
    if !lower.is_finite() || !upper.is_finite() || !increment.is_finite() {
        return Err(Error::Value("Plotting range must be finite".to_string()));
    }
    if upper < lower {
        return Ok(Vec::new());
    }

    // The small bias keeps `upper` when the quotient lands just under a whole
    // number; overshoot is filtered out below.
    let steps = ((upper - lower) / increment + 1e-9).floor();
    if steps >= MAX_SAMPLES as f64 {
        return Err(Error::Value(format!(
            "Plotting range needs more than {MAX_SAMPLES} samples"
        )));
    }

    Ok((0..=steps as usize)
        .map(|i| lower + i as f64 * increment)
        .filter(|x| *x <= upper)
        .collect())
}

/// Renders plots as ASCII charts.
pub struct TextPlot<W: Write> {
    out: W,
    width: usize,
    height: usize,
}

impl<W: Write> TextPlot<W> {
    pub fn new(out: W, width: usize, height: usize) -> Self {
        Self {
            out,
            width: width.max(3),
            height: height.max(3),
        }
    }
}

impl<W: Write> PlotRenderer for TextPlot<W> {
    fn render(&mut self, name: &str, xs: &[f64], ys: &[f64]) {
        let chart = draw(name, xs, ys, self.width, self.height);
        if let Err(e) = self.out.write_all(chart.as_bytes()).and_then(|_| self.out.flush()) {
            warn!(error = %e, "failed to write plot");
        }
    }
}

/// Lays the points out on a `width` x `height` character grid.
///
/// Both axes pass through the origin and share one scale (a row counts as
/// two columns, since terminal cells are about twice as tall as wide).
pub fn draw(name: &str, xs: &[f64], ys: &[f64], width: usize, height: usize) -> String {
    let points: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (*x, *y))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();

    let (mut x_min, mut x_max, mut y_min, mut y_max) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for &(x, y) in &points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    let cols = (width - 1) as f64;
    let rows = (height - 1) as f64;
    let mut x_step = ((x_max - x_min) / cols).max((y_max - y_min) / (2.0 * rows));
    if x_step == 0.0 {
        x_step = 1.0;
    }
    let y_step = 2.0 * x_step;

    let left = (x_min + x_max) / 2.0 - x_step * cols / 2.0;
    let top = (y_min + y_max) / 2.0 + y_step * rows / 2.0;
    let column = |x: f64| ((x - left) / x_step).round();
    let row = |y: f64| ((top - y) / y_step).round();
    let in_grid = |c: f64, r: f64| c >= 0.0 && c <= cols && r >= 0.0 && r <= rows;

    let mut grid = vec![vec![' '; width]; height];

    let (origin_col, origin_row) = (column(0.0), row(0.0));
    if in_grid(origin_col, 0.0) {
        for line in grid.iter_mut() {
            line[origin_col as usize] = '|';
        }
    }
    if in_grid(0.0, origin_row) {
        for cell in grid[origin_row as usize].iter_mut() {
            *cell = if *cell == '|' { '+' } else { '-' };
        }
    }

    for &(x, y) in &points {
        let (c, r) = (column(x), row(y));
        if in_grid(c, r) {
            grid[r as usize][c as usize] = '*';
        }
    }

    let mut chart = String::new();
    for line in grid {
        chart.push_str(line.iter().collect::<String>().trim_end());
        chart.push('\n');
    }
    chart.push_str(&format!("* f(x)={name}(x)\n"));
    chart
}
