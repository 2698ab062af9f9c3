use std::error::Error;
use std::ops::Range;
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use plotters::prelude::*;

use crate::error::Result;
use crate::simulation::true_loss;
use crate::utils::arange;

const FIGURE_SIZE: (u32, u32) = (1024, 768);
const LABEL_FONT_SIZE: i32 = 18;

const PATH_COLORS: [RGBColor; 2] = [RGBColor(0x2D, 0x32, 0x8F), RGBColor(0xF1, 0x5C, 0x19)]; // blue, orange
const STATE_COLORS: [RGBColor; 3] = [
    RGBColor(0xB5, 0x37, 0x37), // red
    RGBColor(0x0B, 0x66, 0x23), // green
    RGBColor(0x2D, 0x32, 0x8F), // blue
];
const LOSS_COLOR: RGBColor = RGBColor(0xB5, 0x37, 0x37); // red
const VALUE_COLORS: [RGBColor; 2] = [RGBColor(0xB5, 0x37, 0x37), RGBColor(0x2D, 0x32, 0x8F)]; // red, blue

struct Curve {
    label: String,
    color: RGBColor,
    points: Vec<(f64, f64)>,
}

/// Legend entry reporting the scalar control cost weight
pub fn r_label(r: &DMatrix<f64>) -> String {
    format!("R={:?}", r[(0, 0)])
}

fn time_series(values: &[f64]) -> Vec<(f64, f64)> {
    values
        .iter()
        .enumerate()
        .map(|(t, v)| (t as f64, *v))
        .collect()
}

/// Axis ranges covering every point, with a small margin on y
fn bounds<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> (Range<f64>, Range<f64>) {
    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for (x, y) in points.filter(|(x, y)| x.is_finite() && y.is_finite()) {
        min_x = min_x.min(*x);
        max_x = max_x.max(*x);
        min_y = min_y.min(*y);
        max_y = max_y.max(*y);
    }
    if min_x > max_x {
        return (0.0..1.0, 0.0..1.0);
    }
    if min_x == max_x {
        max_x = min_x + 1.0;
    }
    let margin = if min_y == max_y {
        1.0
    } else {
        0.05 * (max_y - min_y)
    };
    (min_x..max_x, (min_y - margin)..(max_y + margin))
}

fn draw_curves(
    path: &Path,
    x_desc: &str,
    y_desc: &str,
    curves: &[Curve],
) -> std::result::Result<(), Box<dyn Error>> {
    let (x_range, y_range) = bounds(curves.iter().flat_map(|c| c.points.iter()));

    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .axis_desc_style(("sans-serif", LABEL_FONT_SIZE))
        .draw()?;

    for curve in curves {
        let color = curve.color;
        chart
            .draw_series(LineSeries::new(
                curve.points.iter().copied(),
                color.stroke_width(2),
            ))?
            .label(curve.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .label_font(("sans-serif", LABEL_FONT_SIZE))
        .draw()?;

    root.present()?;
    Ok(())
}

/// Compares one state (or control) path obtained with two control weights
pub fn plot_paths(
    path: impl AsRef<Path>,
    x1: &[f64],
    x2: &[f64],
    ylabel: &str,
    r1: &DMatrix<f64>,
    r2: &DMatrix<f64>,
) -> std::result::Result<(), Box<dyn Error>> {
    let curves = [
        Curve {
            label: r_label(r1),
            color: PATH_COLORS[0],
            points: time_series(x1),
        },
        Curve {
            label: r_label(r2),
            color: PATH_COLORS[1],
            points: time_series(x2),
        },
    ];
    draw_curves(path.as_ref(), "Time", ylabel, &curves)
}

/// One curve per row of `states` (n x (T + 1))
pub fn plot_states(
    path: impl AsRef<Path>,
    states: &DMatrix<f64>,
    ylabel: &str,
    r: &DMatrix<f64>,
) -> std::result::Result<(), Box<dyn Error>> {
    let curves: Vec<Curve> = states
        .row_iter()
        .enumerate()
        .map(|(i, row)| Curve {
            label: format!("Node {}", i + 1),
            color: STATE_COLORS[i % STATE_COLORS.len()],
            points: time_series(&row.iter().copied().collect::<Vec<f64>>()),
        })
        .collect();
    let y_desc = format!("{} ({})", ylabel, r_label(r));
    draw_curves(path.as_ref(), "Time", &y_desc, &curves)
}

pub fn plot_loss(path: impl AsRef<Path>, loss: &[f64]) -> std::result::Result<(), Box<dyn Error>> {
    let curves = [Curve {
        label: "Loss".to_owned(),
        color: LOSS_COLOR,
        points: time_series(loss),
    }];
    draw_curves(path.as_ref(), "Time", "TD error", &curves)
}

/// Approximate value `alpha * model(x)` and true discounted loss on the grid
/// `low, low + 0.1, ..` below `high`.
#[allow(clippy::too_many_arguments)]
pub fn value_function_series(
    model: impl Fn(f64) -> f64,
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    k: &DMatrix<f64>,
    horizon: usize,
    gamma: f64,
    alpha: f64,
    low: f64,
    high: f64,
) -> Result<(Vec<(f64, f64)>, Vec<(f64, f64)>)> {
    let grid = arange(low, high, 0.1);
    let approx = grid.iter().map(|x| (*x, alpha * model(*x))).collect();
    let real = true_loss(a, b, q, r, k, &DVector::from_vec(grid.clone()), horizon, gamma)?;
    let real = grid.iter().copied().zip(real.iter().copied()).collect();
    Ok((approx, real))
}

/// Draws a learned approximation of the value function against the true loss.
/// The usual range is `low = -1.0`, `high = 1.0`.
#[allow(clippy::too_many_arguments)]
pub fn plot_value_function(
    path: impl AsRef<Path>,
    model: impl Fn(f64) -> f64,
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    k: &DMatrix<f64>,
    horizon: usize,
    gamma: f64,
    alpha: f64,
    low: f64,
    high: f64,
) -> std::result::Result<(), Box<dyn Error>> {
    let (approx, real) =
        value_function_series(model, a, b, q, r, k, horizon, gamma, alpha, low, high)?;
    let curves = [
        Curve {
            label: "Approx. Loss Function".to_owned(),
            color: VALUE_COLORS[0],
            points: approx,
        },
        Curve {
            label: "Real Loss Function".to_owned(),
            color: VALUE_COLORS[1],
            points: real,
        },
    ];
    draw_curves(path.as_ref(), "x", "y", &curves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::dlqr;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::dmatrix;

    #[test]
    fn legend_reports_control_weight() {
        assert_eq!(r_label(&dmatrix![1.0]), "R=1.0");
        assert_eq!(r_label(&dmatrix![1000.0, 0.0; 0.0, 1000.0]), "R=1000.0");
        assert_eq!(r_label(&dmatrix![0.01]), "R=0.01");
    }

    #[test]
    fn bounds_cover_points() {
        let points = vec![(0.0, -1.0), (1.0, 3.0), (2.0, 1.0)];
        let (x, y) = bounds(points.iter());
        assert_eq!(x, 0.0..2.0);
        assert_abs_diff_eq!(y.start, -1.2, epsilon = 1e-12);
        assert_abs_diff_eq!(y.end, 3.2, epsilon = 1e-12);

        let flat = vec![(0.0, 5.0)];
        let (x, y) = bounds(flat.iter());
        assert_eq!(x, 0.0..1.0);
        assert_eq!(y, 4.0..6.0);

        let empty: Vec<(f64, f64)> = Vec::new();
        assert_eq!(bounds(empty.iter()), (0.0..1.0, 0.0..1.0));
    }

    #[test]
    fn value_function_grid() -> Result<()> {
        let a = dmatrix![0.9];
        let one = dmatrix![1.0];
        let k = dmatrix![0.5];
        let (approx, real) =
            value_function_series(|x| x * x, &a, &one, &one, &one, &k, 20, 0.95, 2.0, -1.0, 1.0)?;
        assert_eq!(approx.len(), 20);
        assert_eq!(real.len(), 20);
        assert_abs_diff_eq!(approx[0].0, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(approx[0].1, 2.0, epsilon = 1e-12);
        // the loss is quadratic in x
        assert_abs_diff_eq!(real[0].1, real[real.len() - 1].1 * (1.0 / 0.9f64.powi(2)), epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn discounted_value_matches_loss() -> Result<()> {
        let (a, one) = (dmatrix![0.9], dmatrix![1.0]);
        let gamma: f64 = 0.95;
        let solution = dlqr(&(&a * gamma.sqrt()), &(&one * gamma.sqrt()), &one, &one)?;
        let s = solution.riccati[(0, 0)];
        let (approx, real) = value_function_series(
            |x| s * x * x,
            &a,
            &one,
            &one,
            &one,
            &solution.gain,
            400,
            gamma,
            1.0,
            -1.0,
            1.0,
        )?;
        for ((_, predicted), (_, actual)) in approx.iter().zip(real.iter()) {
            assert_relative_eq!(*predicted, *actual, max_relative = 1e-8, epsilon = 1e-12);
        }
        Ok(())
    }
}
