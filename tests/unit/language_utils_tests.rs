/*!
 * Tests for language utility functions
 */

use msgtranslate::language_utils::{
    OFFLINE_CATALOG, catalog_entry, get_language_name, is_auto, is_offline_supported,
    is_valid_language_code, language_codes_match, language_from_locale, normalize_language_code,
};

/// Test that every surface form of a language collapses to one code
#[test]
fn test_normalize_withSurfaceForms_shouldCollapseToOneCode() {
    for form in ["es", "ES", "es-MX", "es_419", "spa", " spa "] {
        assert_eq!(normalize_language_code(form).unwrap(), "es", "form {:?}", form);
    }
    assert_eq!(normalize_language_code("fre").unwrap(), "fr");
    assert_eq!(normalize_language_code("fra").unwrap(), "fr");
}

#[test]
fn test_normalize_withLegacyCodes_shouldUseCurrentCodes() {
    assert_eq!(normalize_language_code("iw").unwrap(), "he");
    assert_eq!(normalize_language_code("in").unwrap(), "id");
}

#[test]
fn test_normalize_withGarbage_shouldFail() {
    assert!(normalize_language_code("xyz").is_err());
    assert!(normalize_language_code("123").is_err());
    assert!(normalize_language_code("e").is_err());
    assert!(!is_valid_language_code("auto"));
}

#[test]
fn test_isAuto_shouldTreatMissingAndAutoAlike() {
    assert!(is_auto(None));
    assert!(is_auto(Some("")));
    assert!(is_auto(Some("AUTO")));
    assert!(!is_auto(Some("en")));
}

/// Test matching of different language code formats
#[test]
fn test_languageCodesMatch_withEquivalentCodes_shouldReturnTrue() {
    assert!(language_codes_match("en", "eng"));
    assert!(language_codes_match("zh-TW", "chi"));
    assert!(language_codes_match("de", "ger"));
    assert!(!language_codes_match("en", "fr"));
    assert!(!language_codes_match("auto", "auto"));
}

#[test]
fn test_getLanguageName_shouldPreferCatalogNames() {
    assert_eq!(get_language_name("es").unwrap(), "Spanish");
    assert_eq!(get_language_name("zh-CN").unwrap(), "Chinese (Simplified)");
    assert!(get_language_name("xyz").is_err());
}

#[test]
fn test_catalog_shouldContainOnlyNormalizedUniqueCodes() {
    let mut seen = std::collections::HashSet::new();
    for entry in OFFLINE_CATALOG {
        assert_eq!(normalize_language_code(entry.code).unwrap(), entry.code);
        assert!(seen.insert(entry.code), "duplicate catalog code {}", entry.code);
        assert!(entry.size_bytes > 0);
    }
    assert!(catalog_entry("en").is_some());
    assert!(is_offline_supported("pt-BR"));
    assert!(!is_offline_supported("sw"));
}

#[test]
fn test_languageFromLocale_shouldParsePosixLocales() {
    assert_eq!(language_from_locale("fr_CA.UTF-8").as_deref(), Some("fr"));
    assert_eq!(language_from_locale("de_DE@euro").as_deref(), Some("de"));
    assert_eq!(language_from_locale("C"), None);
    assert_eq!(language_from_locale("POSIX.UTF-8"), None);
}
