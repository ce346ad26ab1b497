//! HTML fixtures.

/// Builds an article page wrapped in typical boilerplate: a head script,
/// navigation header, sidebar and footer.
#[must_use]
pub fn article_html(title: &str, paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("      <p>{p}</p>\n"))
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <title>{title}</title>
    <script>window.tracking = {{ enabled: true }};</script>
  </head>
  <body>
    <header><nav>Home | About | Contact</nav></header>
    <article>
      <h1>{title}</h1>
{body}    </article>
    <aside class="sidebar">Related stories you may like</aside>
    <footer>Copyright 2024. All rights reserved.</footer>
  </body>
</html>
"#
    )
}
