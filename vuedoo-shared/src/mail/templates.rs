/// Email bodies sent by the service

use super::OutgoingEmail;

pub const VERIFICATION_SUBJECT: &str = "Your Login Verification Code";

/// Builds the login verification email carrying `code`
pub fn verification_email(recipient: &str, code: &str, sender_name: &str) -> OutgoingEmail {
    let text = format!(
        "Hi there,\n\n\
         Your login verification code is: {code}\n\n\
         Please enter this code to verify your email and access your account.\n\n\
         If you didn't request this, please ignore this email.\n\n\
         Thanks,\n\
         {sender_name}"
    );

    let html = format!(
        "<p>Hi there,</p>\n\
         <p>Your login verification code is:</p>\n\
         <h1 style=\"color: #007bff;\">{code}</h1>\n\
         <p>Please enter this code to verify your email and access your account.</p>\n\
         <p>If you didn't request this, please ignore this email.</p>\n\
         <br>\n\
         <p>Thanks,<br>{sender}</p>",
        sender = escape_html(sender_name)
    );

    OutgoingEmail {
        recipient: recipient.to_string(),
        subject: VERIFICATION_SUBJECT.to_string(),
        text,
        html,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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
