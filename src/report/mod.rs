//! Text output: ellipse summaries, scan tables and the plot-script
//! exporter.

use std::fmt::Write as _;

use crate::convolve::BatchResult;
use crate::ellipse::{Ellipse2d, EllipsePair};
use crate::fit::FitReport;

/// Substitute `${name}` placeholders in a script template.
///
/// Placeholders without a matching variable stay in the output verbatim,
/// so partially filled templates remain valid templates.
pub fn substitute_params(template: &str, vars: &[(String, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        match tail.find('}') {
            Some(end) => {
                let name = &tail[..end];
                match vars.iter().find(|(n, _)| n == name) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[start..start + end + 3]),
                }
                rest = &tail[end + 1..];
            }
            None => {
                // Unterminated placeholder, keep the rest as-is.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Shortest-roundtrip formatting for template values.
pub fn format_value(value: f64) -> String {
    format!("{value}")
}

/// One-line summary of an ellipse.
pub fn format_ellipse(ell: &Ellipse2d) -> String {
    format!(
        "{} x {}: hwhm = ({:.5}, {:.5}), angle = {:.3} deg, offs = ({:.5}, {:.5}), area = {:.5}",
        ell.x_lab,
        ell.y_lab,
        ell.x_hwhm,
        ell.y_hwhm,
        ell.phi.to_degrees(),
        ell.x_offs,
        ell.y_offs,
        ell.area
    )
}

/// Summary of the standard views, one projected/sliced pair per block.
pub fn format_surface(pairs: &[EllipsePair]) -> String {
    let mut out = String::new();
    for pair in pairs {
        let _ = writeln!(out, "projected: {}", format_ellipse(&pair.projected));
        let _ = writeln!(out, "sliced:    {}", format_ellipse(&pair.sliced));
    }
    out
}

/// Tabulate a batch as whitespace-separated columns.
pub fn format_scan_table(batch: &BatchResult) -> String {
    let mut out = String::from("# x  h  k  l  E  intensity\n");
    for step in &batch.steps {
        let [h, k, l, e] = step.pos;
        let _ = writeln!(
            out,
            "{:.6} {:.6} {:.6} {:.6} {:.6} {:.6}",
            step.x, h, k, l, e, step.intensity
        );
    }
    if batch.stopped {
        out.push_str("# batch stopped early\n");
    }
    out
}

/// Human-readable fit summary.
pub fn format_fit_report(report: &FitReport) -> String {
    let mut out = String::new();
    let verdict = if report.stopped {
        "stopped"
    } else if report.converged {
        "converged"
    } else {
        "did not converge"
    };
    let _ = writeln!(out, "fit {verdict}, chi2 = {:.6}", report.chi2);
    for param in &report.params {
        let fixed = if param.is_fixed() { " (fixed)" } else { "" };
        let _ = writeln!(
            out,
            "  {} = {:.6} +- {:.6}{}",
            param.name, param.value, param.error, fixed
        );
    }
    out
}

/// Fill a plot-script template from a fit report.
pub fn export_script(template: &str, report: &FitReport) -> String {
    let vars: Vec<(String, String)> = report
        .params
        .iter()
        .map(|p| (p.name.clone(), format_value(p.value)))
        .chain(std::iter::once(("chi2".to_string(), format_value(report.chi2))))
        .collect();
    substitute_params(template, &vars)
}
