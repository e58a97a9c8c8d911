//! HTML for the upload form and its result view.

/// Links shown after a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultLinks {
    pub image_url: String,
    pub pdf_url: String,
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn render_index(result: Option<&ResultLinks>) -> String {
    let mut html = String::from(
        r#"<!doctype html>
<title>Brain Tumor Detection</title>
<h2>Upload an MRI Image</h2>
<form method=post enctype=multipart/form-data>
  <input type=file name=file>
  <input type=submit value=Upload>
</form>
"#,
    );
    if let Some(links) = result {
        html.push_str(&format!(
            r#"  <h3>Prediction Result:</h3>
  <img src="{}" width="500">
  <br><br>
  <a href="{}" target="_blank">Download PDF Report</a>
"#,
            escape_html(&links.image_url),
            escape_html(&links.pdf_url)
        ));
    }
    html
}

pub fn render_error() -> String {
    String::from(
        r#"<!doctype html>
<title>Internal Server Error</title>
<h2>Internal Server Error</h2>
<p>The image could not be processed.</p>
"#,
    )
}
