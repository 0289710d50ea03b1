//! Catalog files compiled into the binary

/// (relative name, contents) of every built-in catalog file
const FILES: &[(&str, &str)] = &[
    (
        "template.yaml",
        include_str!("../../../../templates/template.yaml"),
    ),
    (
        "install.yaml",
        include_str!("../../../../templates/install.yaml"),
    ),
    (
        "component/accordion.yaml",
        include_str!("../../../../templates/component/accordion.yaml"),
    ),
    (
        "component/alert.yaml",
        include_str!("../../../../templates/component/alert.yaml"),
    ),
    ("page.yaml", include_str!("../../../../templates/page.yaml")),
    ("api.yaml", include_str!("../../../../templates/api.yaml")),
    ("theme.yaml", include_str!("../../../../templates/theme.yaml")),
    ("form.yaml", include_str!("../../../../templates/form.yaml")),
    ("table.yaml", include_str!("../../../../templates/table.yaml")),
];

/// Contents of a built-in file
pub fn file(name: &str) -> Option<&'static str> {
    FILES
        .iter()
        .find(|(file, _)| *file == name)
        .map(|(_, contents)| *contents)
}

/// Template catalog files, excluding the root and install manifests
pub fn catalog_names() -> Vec<String> {
    FILES
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| *name != "template.yaml" && *name != "install.yaml")
        .map(str::to_string)
        .collect()
}
