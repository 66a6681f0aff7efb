//! Notification email rendering.

/// Parameters for one notification email body.
///
/// The username is the recipient's handle, not the actor's; the message
/// already names the actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTemplate {
    /// Recipient's handle, used in the greeting.
    pub username: String,
    /// The notification message line.
    pub message: String,
    /// Heading naming the notification category.
    pub header: String,
}

impl NotificationTemplate {
    /// Renders the HTML body with every parameter escaped.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "<!DOCTYPE html>\n\
             <html>\n\
             <body style=\"font-family: sans-serif; color: #333;\">\n\
             <h1>{header}</h1>\n\
             <p>Hi {username},</p>\n\
             <p>{message}</p>\n\
             <p>The Warble Team</p>\n\
             </body>\n\
             </html>\n",
            header = escape_html(&self.header),
            username = escape_html(&self.username),
            message = escape_html(&self.message),
        )
    }
}

/// Escapes the characters HTML treats specially.
fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
