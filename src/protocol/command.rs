#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    SettingsGet,
    SettingsSave,
    DetectEncoding,
    TableLoad,
    TableDesignate,
    TableTranslateAll,
    TableTranslateRow,
    TableMutateRow,
    TableReset,
    TableExport,
    TableQa,
    JsonLoad,
    JsonTranslateAll,
    JsonTranslateEntry,
    JsonMutateEntry,
    JsonReset,
    JsonExport,
    JsonQa,
    DictionaryList,
    DictionarySave,
    DictionaryApply,
    QuizGenerate,
    FortuneGenerate,
    LoanSchedule,
    NumberFormat,
    NumberParse,
    Unknown,
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        match s {
            "ping" => Command::Ping,
            "settings.get" => Command::SettingsGet,
            "settings.save" => Command::SettingsSave,
            "encoding.detect" | "detect_encoding" => Command::DetectEncoding,
            "table.load" => Command::TableLoad,
            "table.designate" => Command::TableDesignate,
            "table.translate_all" => Command::TableTranslateAll,
            "table.translate_row" => Command::TableTranslateRow,
            "table.mutate_row" => Command::TableMutateRow,
            "table.reset" => Command::TableReset,
            "table.export" => Command::TableExport,
            "table.qa" => Command::TableQa,
            "json.load" => Command::JsonLoad,
            "json.translate_all" => Command::JsonTranslateAll,
            "json.translate_entry" => Command::JsonTranslateEntry,
            "json.mutate_entry" => Command::JsonMutateEntry,
            "json.reset" => Command::JsonReset,
            "json.export" => Command::JsonExport,
            "json.qa" => Command::JsonQa,
            "dictionary.list" => Command::DictionaryList,
            "dictionary.save" => Command::DictionarySave,
            "dictionary.apply" => Command::DictionaryApply,
            "quiz.generate" => Command::QuizGenerate,
            "fortune.generate" => Command::FortuneGenerate,
            "loan.schedule" => Command::LoanSchedule,
            "number.format" => Command::NumberFormat,
            "number.parse" => Command::NumberParse,
            _ => Command::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_dotted_names() {
        assert_eq!(Command::from("table.translate_all"), Command::TableTranslateAll);
        assert_eq!(Command::from("detect_encoding"), Command::DetectEncoding);
        assert_eq!(Command::from("project.open"), Command::Unknown);
    }
}
