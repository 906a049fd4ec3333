//! Page shell: gallery and editor view models, metadata, HTML and sitemap.

mod html;
mod meta;
mod navigation;
mod sitemap;
mod views;

pub use html::{render_editor_page, render_error_page, render_gallery_page, render_not_found_page};
pub use meta::{PageMeta, editor_meta, gallery_meta, not_found_meta};
pub use navigation::{NavigationGuard, NavigationTicket};
pub use sitemap::{
    ChangeFrequency, SitemapEntry, generate_sitemap, render_sitemap, sitemap_entries,
};
pub use views::{
    EDITOR_ERROR, EditorView, GALLERY_ERROR, GalleryView, NOT_FOUND_TITLE, TemplateCard,
    editor_path, load_editor, load_gallery,
};
