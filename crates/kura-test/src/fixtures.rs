//! Test fixtures: compiled extension modules and canned payloads.

use kura_core::Manifest;
use serde_json::{Value, json};

/// A complete module exporting every capability.
///
/// Source `"1001"` supports latest updates; source `1002` (a numeric id)
/// does not. Popular and latest listings and image fetches go through the
/// transport hook; everything else is answered locally:
///
/// - `searchManga` echoes the query, suffixed `" (filtered)"` when filters
///   were passed
/// - `getMangaDetails("/broken")` fails with `{"code": 1, ...}`
pub const SAMPLE_MODULE: &str = r##"
var kuraExtension = (function () {
    var BASE = "https://example.org";

    function ok(data) {
        return JSON.stringify({ ok: true, data: data });
    }

    function fail(error) {
        return JSON.stringify({ ok: false, error: error });
    }

    function fetchJson(path) {
        var res = __kuraRequest(BASE + path, "GET", JSON.stringify({ Referer: BASE + "/" }));
        if (res.error) {
            return { error: res.error };
        }
        return { data: JSON.parse(res.body) };
    }

    function listing(path) {
        var result = fetchJson(path);
        return result.error ? fail(result.error) : ok(result.data);
    }

    return {
        __generatedExports: {
            getManifest: function () {
                return ok([
                    { id: "1001", name: "Example", lang: "en", baseUrl: BASE, supportsLatest: true },
                    { id: 1002, name: "Example Archive", lang: "en", baseUrl: "https://archive.example.org", supportsLatest: false }
                ]);
            },
            getPopularManga: function (sourceId, page) {
                return listing("/popular?page=" + page);
            },
            getLatestUpdates: function (sourceId, page) {
                return listing("/latest?page=" + page);
            },
            searchManga: function (sourceId, page, query, filters) {
                var title = typeof filters === "undefined" ? query : query + " (filtered)";
                return ok({ mangas: [{ url: "/search/" + encodeURIComponent(query), title: title }], hasNextPage: false });
            },
            getMangaDetails: function (sourceId, url) {
                if (url === "/broken") {
                    return fail({ code: 1, reason: "details unavailable" });
                }
                return ok({ url: url, title: "Details of " + url, author: "Anon", status: 2, initialized: true });
            },
            getChapterList: function (sourceId, url) {
                return ok([
                    { url: url + "/2", name: "Chapter 2", chapterNumber: 2 },
                    { url: url + "/1", name: "Chapter 1", chapterNumber: 1 }
                ]);
            },
            getPageList: function (sourceId, url) {
                return ok([
                    { index: 0, url: url, imageUrl: "https://img.example.org/0.png" },
                    { index: 1, url: url, imageUrl: "https://img.example.org/1.png" }
                ]);
            },
            getFilterList: function (sourceId) {
                return ok([
                    { type: "Header", name: "Status" },
                    { type: "CheckBox", name: "Completed", state: false }
                ]);
            },
            fetchImage: function (sourceId, pageUrl, imageUrl) {
                var res = __kuraRequest(imageUrl, "GET", JSON.stringify({ Referer: pageUrl }), null, true);
                if (res.error) {
                    return fail(res.error);
                }
                if (!res.isBase64) {
                    return fail("expected binary image data");
                }
                return ok(res.body);
            },
            getHeaders: function (sourceId) {
                return ok({ Referer: BASE + "/", "User-Agent": "kura-sample" });
            }
        }
    };
})();
"##;

/// A module exporting only `getManifest` and `getPopularManga`.
pub const MINIMAL_MODULE: &str = r#"
var minimal = {
    __generatedExports: {
        getManifest: function () {
            return JSON.stringify({ ok: true, data: [{ id: "1", name: "Minimal", lang: "en" }] });
        },
        getPopularManga: function (sourceId, page) {
            return JSON.stringify({ ok: true, data: { mangas: [], hasNextPage: false } });
        }
    }
};
"#;

/// Functions without the export marker.
pub const UNMARKED_MODULE: &str = r#"
var kuraExtension = {
    getManifest: function () {
        return JSON.stringify({ ok: true, data: [] });
    }
};
"#;

/// Two marked objects in one module.
pub const DOUBLE_MARKED_MODULE: &str = r#"
var second = { __generatedExports: { getManifest: function () { return "{\"ok\":true,\"data\":[]}"; } } };
var first = { __generatedExports: { getManifest: function () { return "{\"ok\":true,\"data\":[]}"; } } };
"#;

/// A marked object lacking `getManifest`.
pub const MANIFESTLESS_MODULE: &str = r#"
var kuraExtension = {
    __generatedExports: {
        getPopularManga: function () {
            return JSON.stringify({ ok: true, data: { mangas: [] } });
        }
    }
};
"#;

/// A module whose evaluation throws.
pub const THROWING_MODULE: &str = r#"throw new Error("module exploded");"#;

/// A module whose `getHeaders` returns a number instead of envelope text.
pub const WRONG_RETURN_MODULE: &str = r#"
var kuraExtension = {
    __generatedExports: {
        getManifest: function () {
            return JSON.stringify({ ok: true, data: [{ id: "1", name: "Wrong", lang: "en" }] });
        },
        getHeaders: function () {
            return 42;
        }
    }
};
"#;

/// A popular listing as a site would serve it.
pub const POPULAR_PAGE_JSON: &str = r#"{"mangas":[{"url":"/manga/blue-lantern","title":"Blue Lantern","status":1,"thumbnailUrl":"https://img.example.org/blue.png"},{"url":"/manga/quiet-harbor","title":"Quiet Harbor"}],"hasNextPage":true}"#;

/// The source list [`SAMPLE_MODULE`] reports.
#[must_use]
pub fn sample_sources() -> Value {
    json!([
        {"id": "1001", "name": "Example", "lang": "en", "baseUrl": "https://example.org", "supportsLatest": true},
        {"id": 1002, "name": "Example Archive", "lang": "en", "baseUrl": "https://archive.example.org", "supportsLatest": false}
    ])
}

/// Manifest for [`SAMPLE_MODULE`].
#[must_use]
pub fn sample_manifest() -> Manifest {
    test_manifest("org.example.sample")
}

/// A manifest with the given package name.
#[must_use]
pub fn test_manifest(pkg: &str) -> Manifest {
    Manifest {
        name: "Example".to_owned(),
        pkg: pkg.to_owned(),
        version: "1.0.0".to_owned(),
        nsfw: false,
        authors: None,
    }
}
