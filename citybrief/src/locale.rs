use std::collections::HashMap;

use common::LocaleConfig;
use tracing::warn;

/// A place news can be localized to, with the keywords that identify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    name: String,
    keywords: Vec<String>,
}

impl Locale {
    /// The name is trimmed. Keywords are lower-cased and deduplicated (first
    /// occurrence wins), blank ones dropped; a non-blank name leads the list.
    pub fn new<I, S>(name: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name: String = name.into();
        let name = name.trim().to_string();
        let mut normalized: Vec<String> = Vec::new();
        if !name.is_empty() {
            normalized.push(name.to_lowercase());
        }
        for kw in keywords {
            let kw = kw.as_ref().trim().to_lowercase();
            if !kw.is_empty() && !normalized.contains(&kw) {
                normalized.push(kw);
            }
        }
        Self {
            name,
            keywords: normalized,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

/// Built-in locale table: city, nicknames, province, region and major districts.
const BUILTIN_LOCALES: &[(&str, &[&str])] = &[
    ("北京", &["北京", "首都", "京津冀", "华北", "中关村", "望京", "朝阳", "海淀"]),
    ("上海", &["上海", "魔都", "长三角", "华东", "浦东", "黄浦", "徐汇", "静安"]),
    ("广州", &["广州", "羊城", "珠三角", "华南", "天河", "越秀", "荔湾", "海珠"]),
    ("深圳", &["深圳", "鹏城", "珠三角", "华南", "南山", "福田", "罗湖", "宝安"]),
    ("杭州", &["杭州", "西湖", "浙江", "华东", "滨江", "余杭", "萧山"]),
    ("南京", &["南京", "金陵", "江苏", "华东", "鼓楼", "玄武", "秦淮"]),
    ("成都", &["成都", "蓉城", "四川", "西南", "锦江", "青羊", "武侯"]),
    ("重庆", &["重庆", "山城", "西南", "渝中", "江北", "南岸"]),
    ("武汉", &["武汉", "江城", "湖北", "华中", "武昌", "汉口", "汉阳"]),
    ("西安", &["西安", "古都", "陕西", "西北", "雁塔", "碑林", "莲湖"]),
    ("天津", &["天津", "津门", "华北", "和平", "河东", "河西"]),
    ("青岛", &["青岛", "山东", "华东", "市南", "市北", "李沧"]),
    ("大连", &["大连", "辽宁", "东北", "中山", "西岗", "沙河口"]),
    ("厦门", &["厦门", "福建", "华东", "思明", "湖里", "集美"]),
    ("苏州", &["苏州", "江苏", "华东", "姑苏", "吴中", "相城"]),
    ("无锡", &["无锡", "江苏", "华东", "梁溪", "锡山", "惠山"]),
    ("宁波", &["宁波", "浙江", "华东", "海曙", "江北", "北仑"]),
    ("长沙", &["长沙", "湖南", "华中", "芙蓉", "天心", "岳麓"]),
    ("郑州", &["郑州", "河南", "华中", "金水", "二七", "管城"]),
    ("济南", &["济南", "山东", "华东", "历下", "市中", "槐荫"]),
];

/// Lookup of registered locales by canonical name. Registration order is kept
/// for listing.
#[derive(Debug, Clone, Default)]
pub struct LocaleRegistry {
    order: Vec<String>,
    locales: HashMap<String, Locale>,
}

impl LocaleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (name, keywords) in BUILTIN_LOCALES {
            registry.register(Locale::new(*name, keywords.iter()));
        }
        registry
    }

    /// Configured locales replace the built-in table. Entries with a blank
    /// name are skipped; if none remain the built-in table is kept.
    pub fn from_config(locales: &[LocaleConfig]) -> Self {
        let mut registry = Self::new();
        for cfg in locales {
            let locale = Locale::new(cfg.name.as_str(), cfg.keywords.iter());
            if locale.name().is_empty() {
                warn!("skipping configured locale with a blank name");
                continue;
            }
            registry.register(locale);
        }
        if registry.is_empty() {
            return Self::builtin();
        }
        registry
    }

    /// Registering an existing name replaces its keywords.
    pub fn register(&mut self, locale: Locale) {
        let name = locale.name().to_string();
        if !self.locales.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.locales.insert(name, locale);
    }

    pub fn get(&self, name: &str) -> Option<&Locale> {
        self.locales.get(name.trim())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_name_always_leads_keywords() {
        let locale = Locale::new("Paris", ["Île-de-France", "LOUVRE", "paris"]);
        assert_eq!(locale.keywords(), &["paris", "île-de-france", "louvre"]);
    }

    #[test]
    fn empty_keyword_list_still_holds_name() {
        let locale = Locale::new("Lyon", Vec::<String>::new());
        assert_eq!(locale.keywords(), &["lyon"]);
    }

    #[test]
    fn builtin_table_has_twenty_cities() {
        let registry = LocaleRegistry::builtin();
        assert_eq!(registry.len(), 20);
        assert_eq!(registry.names().next(), Some("北京"));
        let beijing = registry.get("北京").expect("beijing registered");
        assert!(beijing.keywords().contains(&"海淀".to_string()));
        assert!(registry.get("拉萨").is_none());
    }

    #[test]
    fn configured_locales_replace_builtin() {
        let registry = LocaleRegistry::from_config(&[LocaleConfig {
            name: "Berlin".into(),
            keywords: vec!["Mitte".into()],
        }]);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("北京").is_none());
        assert_eq!(
            registry.get("Berlin").map(Locale::keywords),
            Some(&["berlin".to_string(), "mitte".to_string()][..])
        );
    }

    #[test]
    fn configured_names_are_trimmed_and_blank_ones_skipped() {
        let registry = LocaleRegistry::from_config(&[
            LocaleConfig {
                name: "  ".into(),
                keywords: vec!["".into(), "Anywhere".into()],
            },
            LocaleConfig {
                name: " 北京 ".into(),
                keywords: vec!["海淀".into()],
            },
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names().next(), Some("北京"));
        let beijing = registry.get("北京").expect("trimmed name registered");
        assert_eq!(beijing.keywords(), &["北京", "海淀"]);
        assert!(!beijing.keywords().iter().any(String::is_empty));
    }

    #[test]
    fn only_blank_configured_names_keep_builtin() {
        let registry = LocaleRegistry::from_config(&[LocaleConfig {
            name: String::new(),
            keywords: vec!["x".into()],
        }]);
        assert_eq!(registry.len(), 20);
    }

    #[test]
    fn blank_name_adds_no_empty_keyword() {
        let locale = Locale::new("", ["", "Rome"]);
        assert_eq!(locale.keywords(), &["rome"]);
    }
}
