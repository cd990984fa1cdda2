//! Server-rendered pages
//!
//! Every dynamic value goes through `html_escape` before it reaches markup.

use html_escape::encode_text;

fn layout(title: &str, authenticated: bool, body: &str) -> String {
    let nav = if authenticated {
        r#"<a href="/skills">Skills</a> | <a href="/add-skills">Add skills</a> | <a href="/logout">Log out</a>"#
    } else {
        r#"<a href="/login">Log in</a>"#
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title} - Skills</title></head>
<body>
<nav><a href="/">Home</a> | {nav}</nav>
<main>
{body}
</main>
</body>
</html>
"#,
        title = encode_text(title),
    )
}

/// GET /
pub fn home_page(authenticated: bool) -> String {
    let body = if authenticated {
        r#"<h1>Welcome back</h1><p>You are signed in. <a href="/skills">See your skills</a>.</p>"#
    } else {
        r#"<h1>Welcome</h1><p><a href="/login">Log in</a> to manage your skills.</p>"#
    };
    layout("Home", authenticated, body)
}

/// GET /skills
pub fn skills_page(skills: &[String]) -> String {
    let body = if skills.is_empty() {
        "<h1>Your skills</h1><p>No skills yet.</p>".to_string()
    } else {
        let items: String = skills
            .iter()
            .map(|skill| format!("<li>{}</li>", encode_text(skill)))
            .collect();
        format!("<h1>Your skills</h1><ul>{items}</ul>")
    };
    layout("Skills", true, &body)
}

/// GET/POST /add-skills
pub fn add_skills_page(success: bool) -> String {
    let notice = if success {
        r#"<p class="success">Skills added.</p>"#
    } else {
        ""
    };
    let body = format!(
        r#"<h1>Add skills</h1>{notice}
<form method="post" action="/add-skills">
<label for="skills">Skills (comma separated)</label>
<input id="skills" name="skills" type="text">
<button type="submit">Add</button>
</form>"#
    );
    layout("Add skills", true, &body)
}

pub fn error_page(message: &str) -> String {
    let body = format!(
        r#"<h1>Something went wrong</h1><p class="error">{}</p><p><a href="/">Back to home</a></p>"#,
        encode_text(message)
    );
    layout("Error", false, &body)
}
