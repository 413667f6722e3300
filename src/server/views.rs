//! HTML page rendering.
//!
//! Pages are small enough that they are built as strings around a shared
//! layout; all user-sourced text goes through `escape`.

use axum::http::StatusCode;
use axum::response::Html;

use crate::auth::identity::UserInfo;
use crate::services::posts::{Post, PostDetail};

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn display_name(user: &UserInfo) -> String {
    user.name
        .clone()
        .or_else(|| user.email.clone())
        .unwrap_or_else(|| format!("user {}", user.id))
}

fn layout(title: &str, user: Option<&UserInfo>, body: &str) -> String {
    let nav = match user {
        Some(u) => format!(
            "<nav>signed in as {} | <a href=\"/posts\">posts</a> | \
             <a href=\"/google/logout\">log out</a></nav>",
            escape(&display_name(u))
        ),
        None => String::new(),
    };
    format!(
        "<!doctype html>\n<html><head><title>{title}</title></head>\n\
         <body>{nav}\n{body}</body></html>",
        title = escape(title),
        nav = nav,
        body = body
    )
}

pub fn login_page() -> Html<String> {
    Html(layout(
        "bulletin",
        None,
        "<h1>bulletin</h1>\n<p><a href=\"/google/login\">Sign in with Google</a></p>",
    ))
}

pub fn posts_page(user: &UserInfo, posts: &[Post]) -> Html<String> {
    let mut body = String::from("<h1>Posts</h1>\n<p><a href=\"/posts/create\">New post</a></p>\n<ul>");
    for post in posts {
        body.push_str(&format!(
            "<li><a href=\"/posts?post_id={}\">{}</a> by {}</li>",
            post.id,
            escape(&post.title),
            escape(&post.author_name)
        ));
    }
    body.push_str("</ul>");
    Html(layout("Posts", Some(user), &body))
}

pub fn post_page(user: &UserInfo, detail: &PostDetail) -> Html<String> {
    let post = &detail.post;
    let mut body = format!(
        "<h1>{title}</h1>\n<p>by {author}</p>\n<div>{content}</div>\n\
         <form method=\"post\" action=\"/subscribe?user_id={author_id}&amp;post_id={id}\">\
         <button type=\"submit\">Subscribe to {author}</button></form>\n\
         <p><a href=\"/comments/create?post_id={id}\">Add a comment</a></p>\n<h2>Comments</h2>\n<ul>",
        title = escape(&post.title),
        author = escape(&post.author_name),
        content = escape(&post.content),
        author_id = post.author_id,
        id = post.id,
    );
    for comment in &detail.comments {
        body.push_str(&format!(
            "<li>{}: {}</li>",
            escape(&comment.author_name),
            escape(&comment.content)
        ));
    }
    body.push_str("</ul>");
    Html(layout(&post.title, Some(user), &body))
}

pub fn post_form_page(user: &UserInfo) -> Html<String> {
    Html(layout(
        "New post",
        Some(user),
        "<h1>New post</h1>\n<form method=\"post\" action=\"/posts\">\
         <p><input name=\"title\" placeholder=\"Title\"></p>\
         <p><textarea name=\"content\"></textarea></p>\
         <p><button type=\"submit\">Publish</button></p></form>",
    ))
}

pub fn comment_form_page(user: &UserInfo, post_id: &str) -> Html<String> {
    let body = format!(
        "<h1>New comment</h1>\n<form method=\"post\" action=\"/comments?post_id={}\">\
         <p><textarea name=\"content\"></textarea></p>\
         <p><button type=\"submit\">Comment</button></p></form>",
        urlencoding::encode(post_id)
    );
    Html(layout("New comment", Some(user), &body))
}

/// Minimal error page used for every failure that is not the logged-out
/// redirect.
pub fn error_page(status: StatusCode, message: &str) -> String {
    layout(
        &format!("{}", status.as_u16()),
        None,
        &format!(
            "<h1>{} {}</h1>\n<p>{}</p>\n<p><a href=\"/\">Back</a></p>",
            status.as_u16(),
            escape(status.canonical_reason().unwrap_or("Error")),
            escape(message)
        ),
    )
}
