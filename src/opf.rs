//! Cover lookup in EPUB package documents (OPF files).

use anyhow::Result;
use quick_xml::de::from_str;
use serde::Deserialize;

/// Resolve the cover image href declared by an OPF package document.
///
/// EPUB 2 books point at the cover through a `<meta name="cover">` element
/// whose value is a manifest item id; EPUB 3 books mark the manifest item
/// itself with `properties="cover-image"`. Both forms are tried, in that
/// order. Returns `None` when the document declares no cover.
pub fn cover_href(xml: &str) -> Result<Option<String>> {
    let package: Package = from_str(xml)?;
    Ok(find_cover(&package))
}

fn find_cover(package: &Package) -> Option<String> {
    let manifest = package.manifest.as_ref()?;

    if let Some(metadata) = &package.metadata {
        // Most books carry the id in the content attribute; a few put it
        // in the element text instead.
        let cover_id = metadata
            .meta
            .iter()
            .filter(|m| m.name.as_deref() == Some("cover"))
            .find_map(|m| {
                m.content
                    .clone()
                    .or_else(|| m.text.clone())
                    .filter(|v| !v.is_empty())
            });

        if let Some(id) = cover_id {
            let href = manifest
                .item
                .iter()
                .find(|i| i.id.as_deref() == Some(id.as_str()))
                .and_then(|i| i.href.clone());
            if href.is_some() {
                return href;
            }
        }
    }

    manifest
        .item
        .iter()
        .find(|i| i.properties.as_deref() == Some("cover-image"))
        .and_then(|i| i.href.clone())
}

// OPF XML structures for deserialization

#[derive(Debug, Deserialize)]
struct Package {
    metadata: Option<Metadata>,
    manifest: Option<Manifest>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = "meta", default)]
    meta: Vec<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(rename = "@name", default)]
    name: Option<String>,

    #[serde(rename = "@content", default)]
    content: Option<String>,

    #[serde(rename = "$text", default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(rename = "@id", default)]
    id: Option<String>,

    #[serde(rename = "@href", default)]
    href: Option<String>,

    #[serde(rename = "@properties", default)]
    properties: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_cover_via_meta_and_manifest_id() {
        let xml = r#"<?xml version='1.0' encoding='utf-8'?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
        <dc:title>Test Book</dc:title>
        <meta name="cover" content="cover-img"/>
    </metadata>
    <manifest>
        <item id="page1" href="images/001.jpg" media-type="image/jpeg"/>
        <item id="cover-img" href="extra/cover.png" media-type="image/png"/>
    </manifest>
</package>"#;

        assert_eq!(
            cover_href(xml).unwrap(),
            Some("extra/cover.png".to_string())
        );
    }

    #[test]
    fn resolves_cover_id_from_element_text() {
        let xml = r#"<package version="2.0">
    <metadata>
        <meta name="cover">cover-img</meta>
    </metadata>
    <manifest>
        <item id="cover-img" href="cover.jpg"/>
    </manifest>
</package>"#;

        assert_eq!(cover_href(xml).unwrap(), Some("cover.jpg".to_string()));
    }

    #[test]
    fn falls_back_to_cover_image_properties() {
        let xml = r#"<package version="3.0">
    <metadata>
        <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
    </metadata>
    <manifest>
        <item id="c" href="OEBPS/cover.jpg" properties="cover-image"/>
        <item id="p1" href="OEBPS/001.jpg"/>
    </manifest>
</package>"#;

        assert_eq!(
            cover_href(xml).unwrap(),
            Some("OEBPS/cover.jpg".to_string())
        );
    }

    #[test]
    fn dangling_cover_id_falls_back_to_properties() {
        let xml = r#"<package>
    <metadata>
        <meta name="cover" content="missing-id"/>
    </metadata>
    <manifest>
        <item id="c" href="front.png" properties="cover-image"/>
    </manifest>
</package>"#;

        assert_eq!(cover_href(xml).unwrap(), Some("front.png".to_string()));
    }

    #[test]
    fn no_cover_declared() {
        let xml = r#"<package>
    <metadata>
        <meta name="calibre:series" content="Test Series"/>
    </metadata>
    <manifest>
        <item id="p1" href="001.jpg"/>
    </manifest>
</package>"#;

        assert_eq!(cover_href(xml).unwrap(), None);
    }

    #[test]
    fn invalid_xml_is_an_error() {
        assert!(cover_href("<package><metadata>").is_err());
    }
}
