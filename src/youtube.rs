//! YouTube video-id extraction and thumbnail URL candidates.

use reqwest::Url;

const THUMBNAIL_HOST: &str = "https://img.youtube.com/vi";
const THUMBNAIL_VARIANTS: [&str; 4] = ["maxresdefault", "sddefault", "hqdefault", "default"];
const ID_PATH_PREFIXES: [&str; 3] = ["shorts", "embed", "live"];

fn is_video_id(s: &str) -> bool {
    s.len() == 11 && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Accepts a bare 11-character id or a youtube.com / youtu.be URL.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_video_id(input) {
        return Some(input.to_string());
    }

    let url = Url::parse(input).ok()?;
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);

    if host == "youtu.be" {
        let first = url.path().trim_start_matches('/').split('/').next()?;
        return is_video_id(first).then(|| first.to_string());
    }

    if host.ends_with("youtube.com") {
        if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
            if is_video_id(&v) {
                return Some(v.into_owned());
            }
        }
        let segments: Vec<&str> = url.path().split('/').collect();
        return segments
            .windows(2)
            .find(|pair| ID_PATH_PREFIXES.contains(&pair[0]) && is_video_id(pair[1]))
            .map(|pair| pair[1].to_string());
    }

    None
}

/// Thumbnail URLs from highest to lowest resolution.
pub fn thumbnail_candidates(video_id: &str) -> Vec<String> {
    THUMBNAIL_VARIANTS
        .iter()
        .map(|variant| format!("{}/{}/{}.jpg", THUMBNAIL_HOST, video_id, variant))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn accepts_bare_ids() {
        assert_eq!(extract_video_id(ID).as_deref(), Some(ID));
        assert_eq!(extract_video_id("  a_b-c_d-e_f ").as_deref(), Some("a_b-c_d-e_f"));
        assert_eq!(extract_video_id("tooshort"), None);
        assert_eq!(extract_video_id("has space!!"), None);
    }

    #[test]
    fn accepts_common_url_shapes() {
        let urls = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ/",
        ];
        for url in urls {
            assert_eq!(extract_video_id(url).as_deref(), Some(ID), "{}", url);
        }
    }

    #[test]
    fn rejects_other_hosts_and_garbage() {
        assert_eq!(extract_video_id("https://vimeo.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(extract_video_id("https://youtube.com/watch?v=short"), None);
        assert_eq!(extract_video_id("https://youtube.com/channel/dQw4w9WgXcQ"), None);
        assert_eq!(extract_video_id("not a url at all"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn candidates_go_from_large_to_small() {
        let list = thumbnail_candidates(ID);
        assert_eq!(list.len(), 4);
        assert_eq!(list[0], "https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg");
        assert_eq!(list[3], "https://img.youtube.com/vi/dQw4w9WgXcQ/default.jpg");
    }
}
