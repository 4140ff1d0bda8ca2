use url::Url;

use crate::infrastructure::mail::smtp::OutgoingEmail;

const BUTTON_STYLE: &str = "display:inline-block;font-size:18px;font-weight:600;padding:12px 24px;\
background:rgba(46, 62, 223, 1);color:rgb(255, 255, 255);text-decoration:none;border-radius:40px;";

/// `<base>?uid=..&token=..`, keeping any query the base already has.
pub fn frontend_link(base: &str, uidb64: &str, token: &str) -> String {
    match Url::parse(base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("uid", uidb64).append_pair("token", token);
            url.to_string()
        }
        Err(_) => format!("{}?uid={}&token={}", base, uidb64, token),
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn activation_email(to: &str, display_name: &str, activate_url: &str) -> OutgoingEmail {
    let text_body = format!(
        "Dear {display_name},\n\n\
         Thank you for registering with Videoflix. To complete your registration and verify your email address, please click the link below:\n\
         {activate_url}\n\n\
         If you did not create an account with us, please disregard this email.\n\n\
         Best regards,\n\n\
         Your Videoflix Team."
    );

    let html_body = format!(
        r#"<p>Dear {name},</p>
<p>Thank you for registering with Videoflix. To complete your registration and verify your email address, please click the button below:</p>
<p>
  <a href="{url}" style="{style}">
    Activate account
  </a>
</p>
<p>If you did not create an account with us, please disregard this email.</p>
<p>Best regards,<br>Your Videoflix Team.</p>
"#,
        name = escape_html(display_name),
        url = escape_html(activate_url),
        style = BUTTON_STYLE,
    );

    OutgoingEmail {
        to: to.to_string(),
        subject: "Activate your account".to_string(),
        text_body,
        html_body,
    }
}

pub fn password_reset_email(to: &str, display_name: &str, reset_url: &str) -> OutgoingEmail {
    let text_body = format!(
        "Hello {display_name},\n\n\
         We recently received a request to reset your password. If you made this request, please click on the following link to reset your password:\n\
         {reset_url}\n\n\
         Please note that for security reasons, this link is only valid for a limited time.\n\n\
         If you did not request a password reset, please ignore this email.\n\n\
         Best regards,\n\n\
         Your Videoflix Team."
    );

    let html_body = format!(
        r#"<p>Hello {name},</p>
<p>We recently received a request to reset your password. If you made this request, please click on the following link to reset your password:</p>
<p>
  <a href="{url}" style="{style}">
    Reset password
  </a>
</p>
<p>Please note that for security reasons, this link is only valid for a limited time.</p>
<p>If you did not request a password reset, please ignore this email.</p>
<p>Best regards,<br>Your Videoflix Team.</p>
"#,
        name = escape_html(display_name),
        url = escape_html(reset_url),
        style = BUTTON_STYLE,
    );

    OutgoingEmail {
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        text_body,
        html_body,
    }
}
