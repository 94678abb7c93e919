//! Default configuration skeleton and the enumerated animation list.

use serde_json::{json, Value};

/// Symbolic request for every known animation.
pub const ALL_ANIMATIONS: &str = "all";

/// Every animation name the framework ships, in registry order.
pub const ANIMATIONS: &[&str] = &[
    // attention seekers
    "bounce",
    "flash",
    "flip",
    "headShake",
    "heartBeat",
    "hinge",
    "jello",
    "pulse",
    "rubberBand",
    "shake",
    "shakeX",
    "shakeY",
    "swing",
    "tada",
    "wobble",
    // entrances
    "backInDown",
    "backInLeft",
    "backInRight",
    "backInUp",
    "bounceIn",
    "bounceInDown",
    "bounceInLeft",
    "bounceInRight",
    "bounceInUp",
    "fadeIn",
    "fadeInBottomLeft",
    "fadeInBottomRight",
    "fadeInDown",
    "fadeInDownBig",
    "fadeInLeft",
    "fadeInLeftBig",
    "fadeInRight",
    "fadeInRightBig",
    "fadeInTopLeft",
    "fadeInTopRight",
    "fadeInUp",
    "fadeInUpBig",
    "flipInX",
    "flipInY",
    "jackInTheBox",
    "lightSpeedInLeft",
    "lightSpeedInRight",
    "rollIn",
    "rotateIn",
    "rotateInDownLeft",
    "rotateInDownRight",
    "rotateInUpLeft",
    "rotateInUpRight",
    "slideInDown",
    "slideInLeft",
    "slideInRight",
    "slideInUp",
    "zoomIn",
    "zoomInDown",
    "zoomInLeft",
    "zoomInRight",
    "zoomInUp",
    // exits
    "backOutDown",
    "backOutLeft",
    "backOutRight",
    "backOutUp",
    "bounceOut",
    "bounceOutDown",
    "bounceOutLeft",
    "bounceOutRight",
    "bounceOutUp",
    "fadeOut",
    "fadeOutBottomLeft",
    "fadeOutBottomRight",
    "fadeOutDown",
    "fadeOutDownBig",
    "fadeOutLeft",
    "fadeOutLeftBig",
    "fadeOutRight",
    "fadeOutRightBig",
    "fadeOutTopLeft",
    "fadeOutTopRight",
    "fadeOutUp",
    "fadeOutUpBig",
    "flipOutX",
    "flipOutY",
    "lightSpeedOutLeft",
    "lightSpeedOutRight",
    "rollOut",
    "rotateOut",
    "rotateOutDownLeft",
    "rotateOutDownRight",
    "rotateOutUpLeft",
    "rotateOutUpRight",
    "slideOutDown",
    "slideOutLeft",
    "slideOutRight",
    "slideOutUp",
    "zoomOut",
    "zoomOutDown",
    "zoomOutLeft",
    "zoomOutRight",
    "zoomOutUp",
];

/// The skeleton every canonical configuration is merged onto.
///
/// Returns a fresh tree on every call; the skeleton itself is never mutated.
pub fn default_skeleton() -> Value {
    json!({
        "ctx": {},
        "boot": [],
        "css": [],
        "extras": [],
        "animations": [],
        "framework": {
            "components": [],
            "directives": [],
            "plugins": [],
            "config": {}
        },
        "eslint": {
            "include": [],
            "exclude": [],
            "rawOptions": {}
        },
        "sourceFiles": {},
        "htmlVariables": {},
        "devServer": {},
        "build": {
            "env": {},
            "rawDefine": {},
            "envFiles": [],
            "htmlMinifyOptions": {}
        },
        "ssr": {
            "middlewares": []
        },
        "pwa": {
            "manifest": { "icons": [] },
            "metaVariables": {}
        },
        "electron": {
            "preloadScripts": [],
            "unPackagedInstallParams": [],
            "packager": {},
            "builder": {}
        },
        "capacitor": {},
        "cordova": {},
        "bex": {
            "extraScripts": []
        }
    })
}
