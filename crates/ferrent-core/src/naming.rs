//! Identifier conventions shared by the introspector and the migration
//! synthesizer.
//!
//! Entities and fields are described by their logical identifiers
//! (`UpperCamelCase`). Tables and columns derive their names from those
//! identifiers with the helpers below.

/// Converts an identifier to `snake_case`.
///
/// An underscore is inserted before an uppercase letter when the previous
/// character is lowercase, or when the next character is lowercase. Runs of
/// capitals therefore stay together (`XMLParser` becomes `xml_parser`) and
/// already snake-cased input is returned unchanged.
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev_lower = chars[i - 1].is_lowercase();
                let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev_lower || next_lower {
                    result.push('_');
                }
            }
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

/// Converts a `snake_case` identifier to `UpperCamelCase`.
#[must_use]
pub fn to_pascal_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut capitalize_next = true;
    for c in name.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Builds the default table name for an entity type: the snake-cased type
/// name with an `s` appended unless it already ends in one.
#[must_use]
pub fn table_name_pattern(type_name: &str) -> String {
    let mut table = to_snake_case(type_name);
    if !table.ends_with('s') {
        table.push('s');
    }
    table
}

/// Builds the column name of a field from its logical identifier.
#[must_use]
pub fn column_name_pattern(ident: &str) -> String {
    to_snake_case(ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_camel() {
        assert_eq!(to_snake_case("getUserName"), "get_user_name");
        assert_eq!(to_snake_case("userID"), "user_id");
        assert_eq!(to_snake_case("HabitatId"), "habitat_id");
    }

    #[test]
    fn test_snake_case_acronym() {
        assert_eq!(to_snake_case("XMLParser"), "xml_parser");
        assert_eq!(to_snake_case("ID"), "id");
        assert_eq!(to_snake_case("HTTPServerURL"), "http_server_url");
    }

    #[test]
    fn test_snake_case_idempotent() {
        for name in ["user_name", "xml_parser", "id", "animal_food"] {
            assert_eq!(to_snake_case(name), name);
            assert_eq!(to_snake_case(&to_snake_case(name)), to_snake_case(name));
        }
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_pascal_case("habitat_id"), "HabitatId");
        assert_eq!(to_pascal_case("id"), "Id");
        assert_eq!(to_pascal_case("name"), "Name");
    }

    #[test]
    fn test_table_name_pattern() {
        assert_eq!(table_name_pattern("Animal"), "animals");
        assert_eq!(table_name_pattern("AnimalFood"), "animal_foods");
        assert_eq!(table_name_pattern("Status"), "status");
    }

    #[test]
    fn test_column_name_pattern() {
        assert_eq!(column_name_pattern("HabitatId"), "habitat_id");
        assert_eq!(column_name_pattern("Id"), "id");
    }
}
