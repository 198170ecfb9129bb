//! Benchmarks for autotrim.
//!
//! Run with: cargo bench
//!
//! These benchmarks trim synthetic PDFs built in memory.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use autotrim::analysis::{otsu_threshold, to_grayscale};
use autotrim::{TrimMode, TrimOptions};

/// Creates a synthetic PDF with the given number of pages, each carrying a
/// line of text and a filled rectangle.
fn create_test_pdf(page_count: usize) -> Vec<u8> {
    let mut content = String::new();
    let mut offsets = Vec::new();

    // PDF header
    content.push_str("%PDF-1.4\n");

    // Object 1: Catalog
    offsets.push(content.len());
    content.push_str("1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    // Object 2: Pages
    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", i * 2 + 4)).collect();
    offsets.push(content.len());
    content.push_str(&format!(
        "2 0 obj\n<< /Type /Pages /Kids [{}] /Count {} >>\nendobj\n",
        kids.join(" "),
        page_count
    ));

    // Object 3: Font
    offsets.push(content.len());
    content.push_str("3 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>\nendobj\n");

    // Page objects and content
    for i in 0..page_count {
        let page_obj = i * 2 + 4;
        let content_obj = page_obj + 1;

        offsets.push(content.len());
        content.push_str(&format!(
            "{} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>\nendobj\n",
            page_obj, content_obj
        ));

        let stream = format!(
            "BT /F1 12 Tf 100 700 Td (Page {} - Benchmark content for autotrim.) Tj ET \
             0 g 120 120 {} 200 re f",
            i + 1,
            200 + (i % 5) * 40
        );
        offsets.push(content.len());
        content.push_str(&format!(
            "{} 0 obj\n<< /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            content_obj,
            stream.len(),
            stream
        ));
    }

    // Cross-reference table
    let xref_offset = content.len();
    content.push_str(&format!("xref\n0 {}\n", offsets.len() + 1));
    content.push_str("0000000000 65535 f \n");
    for offset in &offsets {
        content.push_str(&format!("{:010} 00000 n \n", offset));
    }

    // Trailer
    content.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        offsets.len() + 1,
        xref_offset
    ));

    content.into_bytes()
}

/// Benchmark PDF format detection.
fn bench_format_detection(c: &mut Criterion) {
    let pdf_data = create_test_pdf(1);
    let non_pdf_data = b"Not a PDF file at all, just random text content";

    c.bench_function("detect_valid_pdf", |b| {
        b.iter(|| autotrim::detect_format_from_bytes(black_box(&pdf_data)).unwrap());
    });

    c.bench_function("detect_non_pdf", |b| {
        b.iter(|| autotrim::detect_format_from_bytes(black_box(non_pdf_data)).is_err());
    });
}

/// Benchmark text and pixel trims at various sizes.
fn bench_trim(c: &mut Criterion) {
    let mut group = c.benchmark_group("trim");
    group.sample_size(20);

    for page_count in [1, 5, 10].iter() {
        let data = create_test_pdf(*page_count);

        for mode in [TrimMode::Text, TrimMode::Pixel] {
            group.bench_function(format!("{}_{}_pages", mode, page_count), |b| {
                let options = TrimOptions::for_mode(mode);
                b.iter(|| {
                    let _ = autotrim::trim_bytes(black_box(&data), &options);
                });
            });
        }
    }

    group.finish();
}

/// Benchmark the threshold computation on a letter-sized raster.
fn bench_otsu(c: &mut Criterion) {
    let (width, height) = (765usize, 990usize);
    let rgba: Vec<u8> = (0..width * height)
        .flat_map(|i| {
            let v = if (i / width) % 40 < 4 { 20 } else { 250 };
            [v, v, v, 255]
        })
        .collect();

    c.bench_function("grayscale_and_otsu", |b| {
        b.iter(|| otsu_threshold(&to_grayscale(black_box(&rgba))));
    });
}

criterion_group!(benches, bench_format_detection, bench_trim, bench_otsu);
criterion_main!(benches);
