//! Minimal hand-rolled `DAV:` multistatus XML for PROPFIND responses. No
//! XML crate is in the dependency stack for anything else, and the
//! document shape is fixed and small enough not to need one.

use rclonepool_pool::FileSummary;

pub struct Resource {
    pub href: String,
    pub display_name: String,
    pub is_collection: bool,
    pub content_length: Option<u64>,
    pub content_type: String,
    pub last_modified_rfc1123: String,
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn resource_xml(r: &Resource) -> String {
    let resourcetype = if r.is_collection { "<D:collection/>" } else { "" };
    let length_prop = r
        .content_length
        .map(|len| format!("<D:getcontentlength>{len}</D:getcontentlength>"))
        .unwrap_or_default();

    format!(
        "<D:response>\
<D:href>{href}</D:href>\
<D:propstat>\
<D:prop>\
<D:displayname>{name}</D:displayname>\
{length_prop}\
<D:getcontenttype>{ctype}</D:getcontenttype>\
<D:getlastmodified>{modified}</D:getlastmodified>\
<D:resourcetype>{resourcetype}</D:resourcetype>\
</D:prop>\
<D:status>HTTP/1.1 200 OK</D:status>\
</D:propstat>\
</D:response>",
        href = escape(&r.href),
        name = escape(&r.display_name),
        ctype = escape(&r.content_type),
        modified = escape(&r.last_modified_rfc1123),
    )
}

/// Wraps zero or more `Resource` entries in a `DAV:` multistatus document.
pub fn multistatus(resources: &[Resource]) -> String {
    let body: String = resources.iter().map(resource_xml).collect();
    format!("<?xml version=\"1.0\" encoding=\"utf-8\"?><D:multistatus xmlns:D=\"DAV:\">{body}</D:multistatus>")
}

/// Builds the `Resource` describing the requested path itself, whether it
/// resolves to a file (`Some(summary)`) or a virtual directory (`None`).
pub fn resource_for(href: &str, display_name: &str, summary: Option<&FileSummary>, created_at_rfc1123: &str) -> Resource {
    match summary {
        Some(s) => Resource {
            href: href.to_string(),
            display_name: display_name.to_string(),
            is_collection: false,
            content_length: Some(s.file_size),
            content_type: mime_guess::from_path(&s.file_path).first_or_octet_stream().to_string(),
            last_modified_rfc1123: created_at_rfc1123.to_string(),
        },
        None => Resource {
            href: href.to_string(),
            display_name: display_name.to_string(),
            is_collection: true,
            content_length: None,
            content_type: "httpd/unix-directory".to_string(),
            last_modified_rfc1123: created_at_rfc1123.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multistatus_wraps_namespace_and_responses() {
        let r = Resource {
            href: "/a.bin".into(),
            display_name: "a.bin".into(),
            is_collection: false,
            content_length: Some(10),
            content_type: "application/octet-stream".into(),
            last_modified_rfc1123: "Mon, 01 Jan 2024 00:00:00 GMT".into(),
        };
        let xml = multistatus(&[r]);
        assert!(xml.contains("xmlns:D=\"DAV:\""));
        assert!(xml.contains("<D:getcontentlength>10</D:getcontentlength>"));
        assert!(xml.contains("<D:response>"));
    }

    #[test]
    fn directory_resource_has_collection_type_and_no_length() {
        let r = Resource {
            href: "/dir/".into(),
            display_name: "dir".into(),
            is_collection: true,
            content_length: None,
            content_type: "httpd/unix-directory".into(),
            last_modified_rfc1123: "Mon, 01 Jan 2024 00:00:00 GMT".into(),
        };
        let xml = multistatus(&[r]);
        assert!(xml.contains("<D:collection/>"));
        assert!(!xml.contains("getcontentlength"));
    }

    #[test]
    fn escapes_special_characters_in_display_name() {
        let r = Resource {
            href: "/a&b.bin".into(),
            display_name: "a&b<c>.bin".into(),
            is_collection: false,
            content_length: Some(1),
            content_type: "application/octet-stream".into(),
            last_modified_rfc1123: "x".into(),
        };
        let xml = multistatus(&[r]);
        assert!(xml.contains("a&amp;b&lt;c&gt;.bin"));
    }
}
