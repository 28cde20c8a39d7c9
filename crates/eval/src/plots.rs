use anyhow::Result;
use plotters::prelude::*;
use std::path::Path;
use tracing::info;

use crate::benchmark::{BenchmarkResults, MethodResults};

pub fn generate_plots(results: &BenchmarkResults, output_dir: impl AsRef<Path>) -> Result<()> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;

    plot_ndcg_by_method(results, &output_dir.join("ndcg_by_method.png"))?;

    Ok(())
}

/// Paired bars per method set: nDCG@5 (blue) and nDCG@10 (red).
fn plot_ndcg_by_method(results: &BenchmarkResults, path: &Path) -> Result<()> {
    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let count = results.methods.len().max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption("nDCG by Retrieval Method", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..count as f64, 0f64..1.05f64)?;

    let labels: Vec<String> = results.methods.iter().map(|m| m.method.clone()).collect();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(count)
        .x_label_formatter(&|x| {
            labels
                .get(x.floor() as usize)
                .cloned()
                .unwrap_or_default()
        })
        .y_desc("nDCG")
        .draw()?;

    let series: [(&str, RGBColor, f64, fn(&MethodResults) -> f64); 2] = [
        ("nDCG@5", BLUE, 0.1, |m| m.ndcg_at_5),
        ("nDCG@10", RED, 0.5, |m| m.ndcg_at_10),
    ];

    for (label, color, offset, metric) in series {
        chart
            .draw_series(results.methods.iter().enumerate().map(|(i, m)| {
                let value = metric(m);
                Rectangle::new(
                    [(i as f64 + offset, 0.0), (i as f64 + offset + 0.4, value)],
                    color.filled(),
                )
            }))?
            .label(label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    info!(path = %path.display(), "Saved nDCG plot");
    Ok(())
}
