use std::collections::HashMap;

use crate::evaluation::Feature;
use crate::presentation::{DisplayModel, FlagSet};

const HOME_TEMPLATE: &str = include_str!("../templates/home.html");

// Everything the home page shows
pub struct HomePage<'a> {
    pub display: &'a DisplayModel,
    pub flags: &'a FlagSet,
    pub user_id: &'a str,
    pub provider: &'a str,
}

/// Render the home page. Text values are escaped; only the feature list
/// is inserted as markup.
pub fn render_home(page: &HomePage) -> String {
    let mut vars: HashMap<&str, String> = HashMap::new();
    vars.insert("variation_name", escape(&page.display.variation_name));
    vars.insert("message", escape(&page.display.message));
    vars.insert("togglebot_src", escape(&page.display.togglebot_image_src));
    vars.insert("header", escape(&page.display.header));
    vars.insert("body", escape(&page.display.body));
    vars.insert("speed", escape(&page.flags.speed));
    vars.insert("wink", page.flags.wink.to_string());
    vars.insert("step", escape(&page.flags.step));
    vars.insert("user_id", escape(page.user_id));
    vars.insert("provider", escape(page.provider));
    vars.insert("features", feature_items(&page.flags.features));

    fill(HOME_TEMPLATE, &vars)
}

fn feature_items(features: &HashMap<String, Feature>) -> String {
    let mut keys: Vec<&String> = features.keys().collect();
    keys.sort();

    keys.into_iter()
        .map(|key| {
            let feature = &features[key];
            format!(
                "                <li><code>{}</code>: {}</li>",
                escape(key),
                escape(&feature.variation_name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// Single pass over the template so substituted values are never re-scanned.
// Unknown placeholders are left in place.
fn fill(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_fill() {
        let mut vars = HashMap::new();
        vars.insert("name", "{{ other }}".to_string());
        vars.insert("other", "nope".to_string());

        assert_eq!(fill("Hi {{ name }}!", &vars), "Hi {{ other }}!");
        assert_eq!(fill("{{missing}} {{ name", &vars), "{{missing}} {{ name");
        assert_eq!(fill("no placeholders", &vars), "no placeholders");
    }

    #[test]
    fn test_render_home() {
        let mut flags = FlagSet {
            speed: "off-axis".to_string(),
            ..Default::default()
        };
        flags.features.insert(
            "hello-togglebot".to_string(),
            Feature {
                key: "hello-togglebot".to_string(),
                variation_name: "<b>On</b>".to_string(),
                ..Default::default()
            },
        );
        let display = DisplayModel::from_flags(&flags);

        let html = render_home(&HomePage {
            display: &display,
            flags: &flags,
            user_id: "my-user",
            provider: "local",
        });

        assert!(html.contains("...I&#39;m gonna be sick..."));
        assert!(html.contains("src=\"/assets/img/togglebot.png\""));
        assert!(html.contains("Welcome to DevCycle&#39;s example app."));
        assert!(html.contains("<strong>&lt;b&gt;On&lt;/b&gt;</strong>"));
        assert!(html.contains("<li><code>hello-togglebot</code>: &lt;b&gt;On&lt;/b&gt;</li>"));
        assert!(html.contains("speed-off-axis"));
        assert!(!html.contains("{{"));
    }
}
