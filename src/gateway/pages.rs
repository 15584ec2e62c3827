//! Server-rendered HTML pages.
//!
//! Form field names (`username`, `newItem`, `updatedItemId`, ...) are part of
//! the gateway's request contract; see the form structs in the parent module.

use crate::store::Item;

fn base_style() -> &'static str {
    r#"
    * { margin: 0; padding: 0; box-sizing: border-box; }
    body {
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
        background: #f5f5f5; color: #333;
        display: flex; justify-content: center; align-items: flex-start;
        min-height: 100vh; padding: 40px 20px;
    }
    .card {
        background: #fff; border-radius: 16px; padding: 32px;
        max-width: 440px; width: 100%; box-shadow: 0 4px 24px rgba(0,0,0,0.08);
    }
    .logo { text-align: center; margin-bottom: 24px; }
    .logo h1 { font-size: 28px; color: #1a1a2e; }
    .logo p { font-size: 14px; color: #666; margin-top: 4px; }
    .form-group { margin-bottom: 16px; }
    .form-group label { display: block; font-size: 14px; font-weight: 500; margin-bottom: 6px; color: #444; }
    input[type=text], input[type=email], input[type=password] {
        width: 100%; padding: 12px 14px; border: 1.5px solid #ddd;
        border-radius: 10px; font-size: 16px; outline: none;
    }
    input:focus { border-color: #4a6cf7; }
    .btn {
        display: block; width: 100%; padding: 14px; border: none; border-radius: 10px;
        font-size: 16px; font-weight: 600; cursor: pointer; text-align: center; text-decoration: none;
    }
    .btn-primary { background: #4a6cf7; color: #fff; }
    .btn-secondary { background: #e8e8e8; color: #333; margin-top: 8px; }
    .link { text-align: center; margin-top: 16px; font-size: 14px; color: #666; }
    .link a { color: #4a6cf7; text-decoration: none; }
    .items { list-style: none; margin: 16px 0; }
    .items li { display: flex; gap: 8px; align-items: center; padding: 8px 0; border-bottom: 1px solid #eee; }
    .items form.edit { flex: 1; }
    .items input[type=text] { padding: 8px 10px; font-size: 15px; }
    .small { padding: 8px 12px; border: none; border-radius: 8px; cursor: pointer; background: #eee; }
    "#
}

/// Escape text for interpolation into HTML bodies and attribute values.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
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

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>{title}</title>
<style>{style}</style>
</head><body>
<div class="card">
{body}
</div>
</body></html>"#,
        style = base_style(),
    )
}

pub fn render_home() -> String {
    page(
        "Daylist",
        r#"  <div class="logo"><h1>Daylist</h1><p>Your list for today</p></div>
  <a class="btn btn-primary" href="/register">Register</a>
  <a class="btn btn-secondary" href="/login">Login</a>"#,
    )
}

fn credentials_form(action: &str, submit: &str, password_autocomplete: &str) -> String {
    format!(
        r#"  <form method="POST" action="{action}">
    <div class="form-group">
      <label>Email</label>
      <input type="email" name="username" required autocomplete="username" placeholder="you@example.com">
    </div>
    <div class="form-group">
      <label>Password</label>
      <input type="password" name="password" required autocomplete="{password_autocomplete}">
    </div>
    <button type="submit" class="btn btn-primary">{submit}</button>
  </form>
  <a class="btn btn-secondary" href="/auth/google">Sign in with Google</a>"#
    )
}

pub fn render_login_page() -> String {
    let form = credentials_form("/login", "Login", "current-password");
    page(
        "Daylist - Login",
        &format!(
            r#"  <div class="logo"><h1>Login</h1></div>
{form}
  <div class="link">No account? <a href="/register">Register</a></div>"#
        ),
    )
}

pub fn render_register_page() -> String {
    let form = credentials_form("/register", "Register", "new-password");
    page(
        "Daylist - Register",
        &format!(
            r#"  <div class="logo"><h1>Register</h1></div>
{form}
  <div class="link">Already registered? <a href="/login">Login</a></div>"#
        ),
    )
}

fn render_item(item: &Item) -> String {
    let title = escape_html(&item.title);
    let id = item.id;
    format!(
        r#"    <li>
      <form class="edit" method="POST" action="/edit">
        <input type="hidden" name="updatedItemId" value="{id}">
        <input type="text" name="updatedItemTitle" value="{title}" required>
      </form>
      <form method="POST" action="/delete">
        <input type="hidden" name="deleteItemId" value="{id}">
        <button type="submit" class="small" aria-label="Delete">&#10005;</button>
      </form>
    </li>"#
    )
}

/// The signed-in user's list.
pub fn render_list_page(list_title: &str, email: &str, items: &[Item]) -> String {
    let list_title = escape_html(list_title);
    let email = escape_html(email);
    let rows: Vec<String> = items.iter().map(render_item).collect();
    let rows = if rows.is_empty() {
        r#"    <li class="empty">Nothing here yet.</li>"#.to_string()
    } else {
        rows.join("\n")
    };

    page(
        &format!("Daylist - {list_title}"),
        &format!(
            r#"  <div class="logo"><h1>{list_title}</h1><p>{email}</p></div>
  <ul class="items">
{rows}
  </ul>
  <form method="POST" action="/add">
    <div class="form-group">
      <input type="text" name="newItem" placeholder="New item" autocomplete="off" required>
    </div>
    <button type="submit" class="btn btn-primary">Add</button>
  </form>
  <a class="btn btn-secondary" href="/logout">Log out</a>"#
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
        assert_eq!(escape_html("Buy milk"), "Buy milk");
    }

    #[test]
    fn list_page_renders_escaped_items() {
        let items = vec![
            Item {
                id: 7,
                title: "Buy milk".into(),
                user_id: 1,
            },
            Item {
                id: 8,
                title: "<b>bold</b>".into(),
                user_id: 1,
            },
        ];
        let html = render_list_page("Today", "alice@example.com", &items);
        assert!(html.contains("Buy milk"));
        assert!(html.contains(r#"name="updatedItemId" value="7""#));
        assert!(html.contains(r#"name="deleteItemId" value="8""#));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(!html.contains("<b>bold</b>"));
        assert!(html.contains("alice@example.com"));
    }

    #[test]
    fn empty_list_has_placeholder() {
        let html = render_list_page("Today", "alice@example.com", &[]);
        assert!(html.contains("Nothing here yet."));
    }

    #[test]
    fn auth_pages_post_to_their_routes() {
        assert!(render_login_page().contains(r#"action="/login""#));
        assert!(render_register_page().contains(r#"action="/register""#));
        assert!(render_login_page().contains(r#"href="/auth/google""#));
        assert!(render_home().contains(r#"href="/register""#));
    }
}
